use promptc::template::TemplateNode;
use promptc::{CompileOptions, Compiler, ErrorKind, MessageRole, Scope, Value};
use serde_json::json;

// {{ greeting = "Hi" }}
// <system>Reply in {{ lang ?? "English" }}.</system>
// <user>{{ greeting }} {{ user?.name }}! {{#if items.length > 0}}{{#each items as item, i}}{{ i + 1 }}.{{ item.title }} {{/each}}{{/if}}</user>
const TEMPLATE: &str = r#"{
  "type": "Fragment", "start": 0, "end": 200,
  "children": [
    { "type": "MustacheTag", "start": 0, "end": 21,
      "expression": { "type": "AssignmentExpression", "operator": "=", "start": 3, "end": 18,
        "left": { "type": "Identifier", "name": "greeting", "start": 3, "end": 11 },
        "right": { "type": "Literal", "value": "Hi", "start": 14, "end": 18 } } },
    { "type": "Text", "data": "\n", "start": 21, "end": 22 },
    { "type": "ElementTag", "name": "system", "start": 22, "end": 74, "attributes": [],
      "children": [
        { "type": "Text", "data": "Reply in ", "start": 30, "end": 39 },
        { "type": "MustacheTag", "start": 39, "end": 64,
          "expression": { "type": "LogicalExpression", "operator": "??", "start": 42, "end": 61,
            "left": { "type": "Identifier", "name": "lang", "start": 42, "end": 46 },
            "right": { "type": "Literal", "value": "English", "start": 50, "end": 59 } } },
        { "type": "Text", "data": ".", "start": 64, "end": 65 }
      ] },
    { "type": "Text", "data": "\n", "start": 74, "end": 75 },
    { "type": "ElementTag", "name": "user", "start": 75, "end": 200, "attributes": [],
      "children": [
        { "type": "MustacheTag", "start": 81, "end": 95,
          "expression": { "type": "Identifier", "name": "greeting", "start": 84, "end": 92 } },
        { "type": "Text", "data": " ", "start": 95, "end": 96 },
        { "type": "MustacheTag", "start": 96, "end": 112,
          "expression": { "type": "ChainExpression", "start": 99, "end": 109,
            "expression": { "type": "MemberExpression", "computed": false, "optional": true, "start": 99, "end": 109,
              "object": { "type": "Identifier", "name": "user", "start": 99, "end": 103 },
              "property": { "type": "Identifier", "name": "name", "start": 105, "end": 109 } } } },
        { "type": "Text", "data": "! ", "start": 112, "end": 114 },
        { "type": "IfBlock", "start": 114, "end": 193,
          "expression": { "type": "BinaryExpression", "operator": ">", "start": 119, "end": 135,
            "left": { "type": "MemberExpression", "computed": false, "optional": false, "start": 119, "end": 131,
              "object": { "type": "Identifier", "name": "items", "start": 119, "end": 124 },
              "property": { "type": "Identifier", "name": "length", "start": 125, "end": 131 } },
            "right": { "type": "Literal", "value": 0, "start": 134, "end": 135 } },
          "children": [
            { "type": "EachBlock", "item": "item", "index": "i", "start": 136, "end": 188,
              "expression": { "type": "Identifier", "name": "items", "start": 143, "end": 148 },
              "children": [
                { "type": "MustacheTag", "start": 160, "end": 169,
                  "expression": { "type": "BinaryExpression", "operator": "+", "start": 163, "end": 168,
                    "left": { "type": "Identifier", "name": "i", "start": 163, "end": 164 },
                    "right": { "type": "Literal", "value": 1, "start": 167, "end": 168 } } },
                { "type": "Text", "data": ".", "start": 169, "end": 170 },
                { "type": "MustacheTag", "start": 170, "end": 186,
                  "expression": { "type": "MemberExpression", "computed": false, "optional": false, "start": 173, "end": 183,
                    "object": { "type": "Identifier", "name": "item", "start": 173, "end": 177 },
                    "property": { "type": "Identifier", "name": "title", "start": 178, "end": 183 } } },
                { "type": "Text", "data": " ", "start": 186, "end": 187 }
              ] }
          ] }
      ] }
  ]
}"#;

fn template() -> TemplateNode {
    serde_json::from_str(TEMPLATE).unwrap()
}

#[tokio::test]
async fn test_compile_deserialized_template() {
    let scope = Scope::from_bindings([
        ("greeting", Value::Null),
        ("lang", Value::Null),
        ("user", Value::from(json!({ "name": "Ada" }))),
        ("items", Value::from(json!([{ "title": "tea" }, { "title": "cake" }]))),
    ]);

    let messages = Compiler::new().compile(&template(), scope).await.unwrap();

    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0].role, MessageRole::System);
    assert_eq!(messages[0].text(), "Reply in English.");
    assert_eq!(messages[1].role, MessageRole::User);
    assert_eq!(messages[1].text(), "Hi Ada! 1.tea 2.cake ");
}

#[tokio::test]
async fn test_missing_binding_reports_span() {
    let scope = Scope::from_bindings([
        ("greeting", Value::Null),
        ("lang", Value::from("French")),
        ("user", Value::Null),
    ]);

    let error = Compiler::new().compile(&template(), scope).await.unwrap_err();

    assert_eq!(error.kind, ErrorKind::UnboundIdentifier("items".to_string()));
    assert_eq!(error.span.map(|s| (s.start, s.end)), Some((119, 124)));
}

#[tokio::test]
async fn test_options_from_json() {
    let options = CompileOptions::from_str(r#"{ "root_text": "discard", "implicit_declarations": true }"#)
        .unwrap();
    let scope = Scope::from_bindings([
        ("lang", Value::Null),
        ("user", Value::Null),
        ("items", Value::List(vec![])),
    ]);

    let messages = Compiler::with_options(options)
        .compile(&template(), scope)
        .await
        .unwrap();

    assert_eq!(messages[1].text(), "Hi ! ");
}
