use std::sync::Arc;

use promptc::ast::{AssignmentOperator, BinaryOperator, Expression, LogicalOperator};
use promptc::eval::function::MockCallable;
use promptc::template::TemplateNode;
use promptc::{Compiler, Scope, Value};
use serde_json::json;

use super::{tag, var};

fn never_called() -> Value {
    let mut mock = MockCallable::new();
    mock.expect_call().times(0);
    Value::Function(Arc::new(mock))
}

fn called_once(result: &'static str) -> Value {
    let mut mock = MockCallable::new();
    mock.expect_call()
        .times(1)
        .returning(move |_| Ok(Value::from(result)));
    Value::Function(Arc::new(mock))
}

fn call(name: &str) -> Expression {
    Expression::call(Expression::identifier(name), vec![])
}

#[tokio::test]
async fn test_short_circuit_laws() {
    let template = tag(
        "user",
        vec![
            TemplateNode::mustache(Expression::logical(
                LogicalOperator::Or,
                Expression::string("left"),
                call("skipped"),
            )),
            TemplateNode::text(" "),
            TemplateNode::mustache(Expression::logical(
                LogicalOperator::And,
                Expression::number(0.0),
                call("skipped"),
            )),
            TemplateNode::text(" "),
            TemplateNode::mustache(Expression::logical(
                LogicalOperator::Or,
                Expression::string(""),
                call("evaluated"),
            )),
        ],
    );
    let scope = Scope::from_bindings([
        ("skipped", never_called()),
        ("evaluated", called_once("right")),
    ]);

    let messages = Compiler::new().compile(&template, scope).await.unwrap();

    assert_eq!(messages[0].text(), "left 0 right");
}

#[tokio::test]
async fn test_conditional_law() {
    let template = tag(
        "user",
        vec![TemplateNode::mustache(Expression::conditional(
            Expression::binary(
                BinaryOperator::GreaterThan,
                Expression::identifier("score"),
                Expression::number(50.0),
            ),
            call("taken"),
            call("untaken"),
        ))],
    );
    let scope = Scope::from_bindings([
        ("score", Value::from(80)),
        ("taken", called_once("pass")),
        ("untaken", never_called()),
    ]);

    let messages = Compiler::new().compile(&template, scope).await.unwrap();

    assert_eq!(messages[0].text(), "pass");
}

#[tokio::test]
async fn test_untaken_if_branch_is_never_walked() {
    let template = tag(
        "user",
        vec![
            TemplateNode::text("ok"),
            TemplateNode::if_block(
                Expression::boolean(false),
                vec![TemplateNode::mustache(call("untaken"))],
                None,
            ),
        ],
    );
    let scope = Scope::from_bindings([("untaken", never_called())]);

    let messages = Compiler::new().compile(&template, scope).await.unwrap();

    assert_eq!(messages[0].text(), "ok");
}

#[tokio::test]
async fn test_block_assignment_reaches_declaring_scope() {
    let add_item = TemplateNode::mustache(Expression::assign(
        AssignmentOperator::AddAssign,
        Expression::identifier("summary"),
        Expression::identifier("item"),
    ));
    let template = tag(
        "user",
        vec![
            TemplateNode::each_block(
                Expression::identifier("items"),
                "item",
                None,
                vec![add_item],
                None,
            ),
            TemplateNode::if_block(Expression::boolean(true), vec![var("summary")], None),
        ],
    );
    let scope = Scope::from_bindings([
        ("items", Value::from(json!(["a", "b", "c"]))),
        ("summary", Value::from("items: ")),
    ]);

    let messages = Compiler::new().compile(&template, scope).await.unwrap();

    assert_eq!(messages[0].text(), "items: abc");
}

#[tokio::test]
async fn test_nested_each_shadows_outer_binding() {
    let template = tag(
        "user",
        vec![TemplateNode::each_block(
            Expression::identifier("groups"),
            "group",
            Some("g"),
            vec![
                var("g"),
                TemplateNode::text("["),
                TemplateNode::each_block(
                    Expression::identifier("group"),
                    "item",
                    Some("g"),
                    vec![var("g"), TemplateNode::text("="), var("item"), TemplateNode::text(";")],
                    None,
                ),
                TemplateNode::text("]"),
            ],
            None,
        )],
    );
    let scope = Scope::from_bindings([("groups", Value::from(json!([["x", "y"], ["z"]])))]);

    let messages = Compiler::new().compile(&template, scope).await.unwrap();

    assert_eq!(messages[0].text(), "0[0=x;1=y;]1[0=z;]");
}

#[tokio::test]
async fn test_each_generates_messages() {
    let template = TemplateNode::each_block(
        Expression::identifier("turns"),
        "turn",
        None,
        vec![TemplateNode::element(
            "message",
            vec![promptc::template::Attribute::expression(
                "role",
                Expression::member(Expression::identifier("turn"), "role"),
            )],
            vec![TemplateNode::mustache(Expression::member(
                Expression::identifier("turn"),
                "text",
            ))],
        )],
        Some(vec![tag("user", vec![TemplateNode::text("no history")])]),
    );
    let turns = json!([
        { "role": "user", "text": "hi" },
        { "role": "assistant", "text": "hello" }
    ]);

    let messages = Compiler::new()
        .compile(&template, Scope::from_bindings([("turns", Value::from(turns))]))
        .await
        .unwrap();
    let texts: Vec<_> = messages.iter().map(|m| (m.role.to_string(), m.text())).collect();
    assert_eq!(
        texts,
        vec![
            ("user".to_string(), "hi".to_string()),
            ("assistant".to_string(), "hello".to_string())
        ]
    );

    let messages = Compiler::new()
        .compile(&template, Scope::from_bindings([("turns", Value::List(vec![]))]))
        .await
        .unwrap();
    assert_eq!(messages[0].text(), "no history");
}
