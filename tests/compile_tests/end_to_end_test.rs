use pretty_assertions::assert_eq;
use promptc::ast::{BinaryOperator, Expression};
use promptc::template::{Attribute, TemplateNode};
use promptc::{Compiler, ErrorKind, Message, MessageContent, MessageRole, Scope, ToolCall, Value};
use serde_json::json;

use super::{tag, var};

#[tokio::test]
async fn test_hello_world() {
    let template = TemplateNode::element(
        "message",
        vec![Attribute::text("role", "user")],
        vec![TemplateNode::text("Hello "), var("name")],
    );
    let scope = Scope::from_bindings([("name", Value::from("World"))]);

    let messages = Compiler::new().compile(&template, scope).await.unwrap();

    assert_eq!(
        messages,
        vec![Message::new(MessageRole::User, vec![MessageContent::text("Hello World")])]
    );
}

#[tokio::test]
async fn test_conversation() {
    let template = TemplateNode::fragment(vec![
        TemplateNode::text("You are a travel agent for "),
        var("company"),
        TemplateNode::text(".\n\n"),
        tag("user", vec![TemplateNode::text("What is the weather in "), var("city"), TemplateNode::text("?")]),
        TemplateNode::text("\n"),
        tag(
            "assistant",
            vec![TemplateNode::element(
                "tool-call",
                vec![
                    Attribute::text("id", "call_1"),
                    Attribute::text("name", "get_weather"),
                    Attribute::expression(
                        "arguments",
                        Expression::object(vec![("city", Expression::identifier("city"))]),
                    ),
                ],
                vec![],
            )],
        ),
        TemplateNode::text("\n"),
        TemplateNode::element(
            "tool",
            vec![Attribute::text("id", "call_1"), Attribute::text("name", "get_weather")],
            vec![TemplateNode::text("Sunny, "), var("degrees"), TemplateNode::text("C")],
        ),
        TemplateNode::text("\n"),
        tag(
            "user",
            vec![
                tag("text", vec![TemplateNode::text("Compare with this picture:")]),
                tag("image", vec![var("picture")]),
            ],
        ),
    ]);
    let scope = Scope::from_bindings([
        ("company", Value::from("Acme")),
        ("city", Value::from("Lisbon")),
        ("degrees", Value::from(24)),
        ("picture", Value::from("https://example.com/lisbon.jpg")),
    ]);

    let messages = Compiler::new().compile(&template, scope).await.unwrap();

    let mut assistant = Message::new(MessageRole::Assistant, vec![]);
    assistant.tool_calls.push(ToolCall {
        id: "call_1".to_string(),
        name: "get_weather".to_string(),
        arguments: json!({ "city": "Lisbon" }),
    });
    let mut tool = Message::new(
        MessageRole::Tool,
        vec![MessageContent::ToolResult {
            tool_call_id: "call_1".to_string(),
            tool_name: Some("get_weather".to_string()),
            result: "Sunny, 24C".to_string(),
            is_error: false,
        }],
    );
    tool.attributes.insert("id".to_string(), json!("call_1"));
    tool.attributes.insert("name".to_string(), json!("get_weather"));

    assert_eq!(
        messages,
        vec![
            Message::new(
                MessageRole::System,
                vec![MessageContent::text("You are a travel agent for Acme.\n\n")]
            ),
            Message::new(
                MessageRole::User,
                vec![MessageContent::text("What is the weather in Lisbon?")]
            ),
            assistant,
            tool,
            Message::new(
                MessageRole::User,
                vec![
                    MessageContent::text("Compare with this picture:"),
                    MessageContent::Image {
                        image: "https://example.com/lisbon.jpg".to_string()
                    },
                ]
            ),
        ]
    );
}

#[tokio::test]
async fn test_async_function_in_template() {
    let mut compiler = Compiler::new();
    compiler.functions_mut().register_fn("lookup", |args: Vec<Value>| async move {
        tokio::task::yield_now().await;
        let key = args.first().map(Value::to_string).unwrap_or_default();
        Ok::<_, promptc::FunctionError>(Value::from(format!("<{}>", key)))
    });
    let template = tag(
        "user",
        vec![TemplateNode::mustache(Expression::binary(
            BinaryOperator::Add,
            Expression::call(Expression::identifier("lookup"), vec![Expression::string("a")]),
            Expression::call(Expression::identifier("lookup"), vec![Expression::string("b")]),
        ))],
    );

    let messages = compiler.compile(&template, Scope::new()).await.unwrap();

    assert_eq!(messages[0].text(), "<a><b>");
}

#[tokio::test]
async fn test_output_serializes_to_wire_shape() {
    let template = TemplateNode::fragment(vec![
        TemplateNode::element("user", vec![Attribute::text("name", "ada")], vec![TemplateNode::text("hi")]),
    ]);
    let messages = Compiler::new().compile(&template, Scope::new()).await.unwrap();

    assert_eq!(
        serde_json::to_value(&messages).unwrap(),
        json!([
            { "role": "user", "content": [ { "type": "text", "text": "hi" } ], "name": "ada" }
        ])
    );
}

#[tokio::test]
async fn test_attributes_cannot_replace_message_fields() {
    let template = TemplateNode::element(
        "user",
        vec![Attribute::text("role", "user"), Attribute::text("name", "ada")],
        vec![TemplateNode::text("hi")],
    );
    let messages = Compiler::new().compile(&template, Scope::new()).await.unwrap();
    assert_eq!(
        serde_json::to_string(&messages).unwrap(),
        r#"[{"role":"user","content":[{"type":"text","text":"hi"}],"name":"ada"}]"#
    );

    let cases = [
        ("role", "assistant"),
        ("content", "x"),
        ("toolCalls", "[]"),
    ];
    for (attribute, value) in cases {
        let template = TemplateNode::element(
            "user",
            vec![Attribute::text(attribute, value)],
            vec![TemplateNode::text("hi")],
        )
        .with_span(0, 40);

        let error = Compiler::new().compile(&template, Scope::new()).await.unwrap_err();

        assert_eq!(
            error.kind,
            ErrorKind::ReservedAttribute {
                tag: "user".to_string(),
                attribute: attribute.to_string(),
            }
        );
        assert_eq!(error.code(), "reserved-attribute");
        assert_eq!(error.span.map(|s| (s.start, s.end)), Some((0, 40)));
    }
}

#[tokio::test]
async fn test_concurrent_compilations_are_independent() {
    let template = tag(
        "user",
        vec![
            TemplateNode::mustache(Expression::update(
                promptc::ast::UpdateOperator::Increment,
                true,
                Expression::identifier("n"),
            )),
            var("n"),
        ],
    );
    let compiler = Compiler::new();
    let runs = (0..8).map(|i| {
        let scope = Scope::from_bindings([("n", Value::from(i))]);
        let compiler = &compiler;
        let template = &template;
        async move { compiler.compile(template, scope).await }
    });

    let results = futures::future::join_all(runs).await;

    for (i, result) in results.into_iter().enumerate() {
        assert_eq!(result.unwrap()[0].text(), (i + 1).to_string());
    }
}
