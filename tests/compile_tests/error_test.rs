use std::sync::Arc;
use std::time::Duration;

use futures::future::AbortHandle;
use promptc::ast::{AssignmentOperator, Expression, Span};
use promptc::template::TemplateNode;
use promptc::{CompileOptions, Compiler, ErrorKind, FunctionError, RootTextPolicy, Scope, Value};

use super::{tag, var};

#[tokio::test]
async fn test_unclosed_message() {
    let template = TemplateNode::fragment(vec![
        tag("system", vec![TemplateNode::text("rules")]).with_span(0, 22),
        TemplateNode::unclosed_element("user", vec![], vec![TemplateNode::text("Hello")])
            .with_span(22, 28),
    ]);

    let error = Compiler::new().compile(&template, Scope::new()).await.unwrap_err();

    assert_eq!(error.kind, ErrorKind::UnclosedMessage);
    assert_eq!(error.code(), "unclosed-message");
    assert_eq!(error.span, Some(Span::new(22, 28)));
}

#[tokio::test]
async fn test_call_error_points_at_call_site() {
    let mut compiler = Compiler::new();
    compiler.functions_mut().register_fn("fetch", |_| async {
        tokio::task::yield_now().await;
        Err::<Value, _>(FunctionError::failed("connection refused"))
    });
    let template = tag(
        "user",
        vec![
            TemplateNode::text("Data: "),
            TemplateNode::mustache(
                Expression::call(Expression::identifier("fetch").with_span(9, 14), vec![]).with_span(9, 16),
            ),
        ],
    );

    let error = compiler.compile(&template, Scope::new()).await.unwrap_err();

    assert_eq!(error.kind, ErrorKind::CallError("connection refused".to_string()));
    assert_eq!(error.span, Some(Span::new(9, 16)));
    assert_eq!(error.message(), "Error calling function: connection refused");
}

#[tokio::test]
async fn test_nested_compile_error_passes_through() {
    // `render` compiles a partial with a stray closing tag
    let partial = TemplateNode::fragment(vec![
        TemplateNode::unclosed_element("user", vec![], vec![TemplateNode::text("partial")]).with_span(200, 230),
        TemplateNode::closing("assistant").with_span(230, 242),
        TemplateNode::closing("assistant").with_span(242, 254),
    ]);
    let inner = Arc::new(Compiler::new());
    let mut compiler = Compiler::new();
    compiler.functions_mut().register_fn("render", move |_| {
        let inner = inner.clone();
        let partial = partial.clone();
        async move {
            let messages = inner.compile(&partial, Scope::new()).await?;
            Ok::<_, FunctionError>(Value::from(messages.len() as i64))
        }
    });
    let template = tag(
        "user",
        vec![TemplateNode::mustache(
            Expression::call(Expression::identifier("render"), vec![]).with_span(3, 11),
        )],
    );

    let error = compiler.compile(&template, Scope::new()).await.unwrap_err();

    assert_eq!(error.kind, ErrorKind::UnmatchedMessageClose);
    assert_eq!(error.span, Some(Span::new(242, 254)));
}

#[tokio::test]
async fn test_not_callable() {
    let template = tag(
        "user",
        vec![TemplateNode::mustache(
            Expression::call(Expression::identifier("count"), vec![]).with_span(2, 9),
        )],
    );
    let scope = Scope::from_bindings([("count", Value::from(3))]);

    let error = Compiler::new().compile(&template, scope).await.unwrap_err();

    assert_eq!(error.kind, ErrorKind::NotCallable("number".to_string()));
    assert_eq!(error.span, Some(Span::new(2, 9)));
}

#[tokio::test]
async fn test_structural_errors_carry_node_span() {
    let cases = vec![
        (
            TemplateNode::fragment(vec![tag("text", vec![TemplateNode::text("x")]).with_span(0, 15)]),
            ErrorKind::ContentOutsideMessage,
            Span::new(0, 15),
        ),
        (
            tag("user", vec![tag("assistant", vec![]).with_span(6, 30)]),
            ErrorKind::NestedMessage,
            Span::new(6, 30),
        ),
        (
            tag("user", vec![tag("text", vec![tag("image", vec![]).with_span(12, 27)])]),
            ErrorKind::NestedContent,
            Span::new(12, 27),
        ),
        (
            tag("user", vec![TemplateNode::closing("text").with_span(6, 13)]),
            ErrorKind::UnmatchedContentClose,
            Span::new(6, 13),
        ),
        (
            tag("assistant", vec![]).with_span(0, 23),
            ErrorKind::EmptyMessage("assistant".to_string()),
            Span::new(0, 23),
        ),
    ];

    for (template, kind, span) in cases {
        let error = Compiler::new().compile(&template, Scope::new()).await.unwrap_err();
        assert_eq!(error.kind, kind);
        assert_eq!(error.span, Some(span));
    }
}

#[tokio::test]
async fn test_unclosed_content() {
    let template = tag(
        "user",
        vec![TemplateNode::unclosed_element("text", vec![], vec![var("name")])],
    );
    let scope = Scope::from_bindings([("name", Value::from("x"))]);

    let result = Compiler::new().compile(&template, scope).await;

    // the open content is force-closed by the closing message tag
    assert!(result.is_ok());

    let template = TemplateNode::unclosed_element(
        "user",
        vec![],
        vec![TemplateNode::unclosed_element("text", vec![], vec![]).with_span(6, 12)],
    )
    .with_span(0, 6);
    let error = Compiler::new().compile(&template, Scope::new()).await.unwrap_err();
    assert_eq!(error.kind, ErrorKind::UnclosedContent);
    assert_eq!(error.span, Some(Span::new(6, 12)));
}

#[tokio::test]
async fn test_assignment_to_undeclared_name() {
    let template = tag(
        "user",
        vec![
            TemplateNode::mustache(Expression::assign(
                AssignmentOperator::Assign,
                Expression::identifier("fresh"),
                Expression::string("value"),
            )),
            var("fresh"),
        ],
    );

    let error = Compiler::new().compile(&template, Scope::new()).await.unwrap_err();
    assert_eq!(error.kind, ErrorKind::UnboundIdentifier("fresh".to_string()));

    let compiler = Compiler::with_options(CompileOptions {
        implicit_declarations: true,
        ..CompileOptions::default()
    });
    let messages = compiler.compile(&template, Scope::new()).await.unwrap();
    assert_eq!(messages[0].text(), "value");
}

#[tokio::test]
async fn test_reject_root_text() {
    let compiler = Compiler::with_options(CompileOptions {
        root_text: RootTextPolicy::Reject,
        ..CompileOptions::default()
    });
    let template = TemplateNode::fragment(vec![
        TemplateNode::text("stray").with_span(0, 5),
        tag("user", vec![TemplateNode::text("hi")]).with_span(5, 20),
    ]);

    let error = compiler.compile(&template, Scope::new()).await.unwrap_err();

    assert_eq!(error.kind, ErrorKind::StrayTextOutsideMessage);
    assert_eq!(error.span, Some(Span::new(0, 5)));
}

#[tokio::test]
async fn test_abort_cancels_compilation() {
    let mut compiler = Compiler::new();
    compiler.functions_mut().register_fn("wait", |_| async {
        tokio::time::sleep(Duration::from_secs(10)).await;
        Ok::<_, FunctionError>(Value::Null)
    });
    let template = tag(
        "user",
        vec![TemplateNode::mustache(Expression::call(Expression::identifier("wait"), vec![]))],
    );
    let (handle, registration) = AbortHandle::new_pair();

    let abort = async {
        tokio::time::sleep(Duration::from_millis(10)).await;
        handle.abort();
    };
    let (result, _) = tokio::join!(
        compiler.compile_abortable(&template, Scope::new(), registration),
        abort
    );

    let error = result.unwrap_err();
    assert_eq!(error.kind, ErrorKind::Cancelled("aborted".to_string()));
}
