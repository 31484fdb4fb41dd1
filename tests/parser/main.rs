// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use msgpath::{unstable::*, *};

use anyhow::{anyhow, bail, Result};
use serde::{Deserialize, Serialize};
use test_generator::test_resources;

#[derive(Serialize, Deserialize, PartialEq, Debug)]
#[serde(deny_unknown_fields)]
struct TestCase {
    note: String,
    path: String,
    #[serde(default)]
    topic: Option<String>,
    #[serde(default)]
    components: Vec<String>,
    #[serde(default)]
    variables: Vec<String>,
    #[serde(default)]
    modifier: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Serialize, Deserialize, PartialEq, Debug)]
#[serde(deny_unknown_fields)]
struct YamlTest {
    cases: Vec<TestCase>,
}

fn operand(op: &Operand) -> String {
    match op {
        Operand::Literal(v) => v.to_string(),
        Operand::Variable { name, .. } => format!("${name}"),
    }
}

fn bound(op: &Option<Operand>) -> String {
    op.as_ref().map(operand).unwrap_or_default()
}

fn component(c: &PathComponent) -> String {
    match c {
        PathComponent::Name(name) => format!("name {name}"),
        PathComponent::Index(op) => format!("index {}", operand(op)),
        PathComponent::Slice { start, end } => format!("slice {}:{}", bound(start), bound(end)),
        PathComponent::Filter(f) => format!(
            "filter {}=={} ({})",
            f.path.join("."),
            operand(&f.value),
            f.repr
        ),
    }
}

fn parse(text: &str) -> Result<MessagePath> {
    let source = Source::from_contents(text)?;
    let mut parser = Parser::new(&source)?;
    parser.parse()
}

fn match_case(case: &TestCase) -> Result<()> {
    match (parse(&case.path), &case.error) {
        (Ok(path), None) => {
            if parse_message_path(&case.path).as_ref() != Some(&path) {
                bail!("parse_message_path disagrees with the parser");
            }
            if &*path.source != case.path {
                bail!("source `{}` differs from input", path.source);
            }

            let topic = case.topic.as_deref().ok_or_else(|| anyhow!("missing topic"))?;
            if &*path.topic_name != topic {
                bail!("topic: expected `{topic}`, got `{}`", path.topic_name);
            }

            let actual: Vec<String> = path.components.iter().map(component).collect();
            if actual != case.components {
                bail!("components:\nexpected {:?}\nactual   {actual:?}", case.components);
            }

            let variables: Vec<String> = path.variables().iter().map(|v| v.to_string()).collect();
            if variables != case.variables {
                bail!("variables:\nexpected {:?}\nactual   {variables:?}", case.variables);
            }
            if path.has_variables() == case.variables.is_empty() {
                bail!("has_variables disagrees with variables");
            }

            let modifier = path.modifier.map(|Modifier::Json| "json".to_string());
            if modifier != case.modifier {
                bail!("modifier: expected {:?}, got {modifier:?}", case.modifier);
            }
            Ok(())
        }
        (Ok(path), Some(error)) => bail!("expected error `{error}`, parsed {path:?}"),
        (Err(e), Some(error)) => {
            if parse_message_path(&case.path).is_some() {
                bail!("parse_message_path accepted invalid path");
            }
            let msg = e.to_string();
            if !msg.contains(error.as_str()) {
                bail!("expected error `{error}`, got {msg}");
            }
            Ok(())
        }
        (Err(e), None) => Err(e),
    }
}

fn yaml_test_impl(file: &str) -> Result<()> {
    let yaml_str = std::fs::read_to_string(file)?;
    let test: YamlTest = serde_yaml::from_str(&yaml_str)?;

    println!("running {file}");
    for case in &test.cases {
        print!("case {} ", case.note);
        match_case(case).map_err(|e| anyhow!("{}: {e}", case.note))?;
        println!("passed");
    }
    Ok(())
}

fn yaml_test(file: &str) -> Result<()> {
    match yaml_test_impl(file) {
        Ok(_) => Ok(()),
        Err(e) => {
            // If Err is returned, it doesn't always get printed by cargo test.
            // Therefore, panic with the error.
            panic!("{e}");
        }
    }
}

#[test_resources("tests/parser/cases/*.yaml")]
fn run(path: &str) {
    yaml_test(path).unwrap()
}

#[test]
fn error_points_at_offending_column() -> Result<()> {
    let e = parse("/topic.arr[1.5]").expect_err("fractional index");
    let msg = e.to_string();
    assert!(msg.contains("--> <path>:1:13"), "{msg}");
    assert!(msg.contains("1 | /topic.arr[1.5]"), "{msg}");
    assert!(msg.contains(&format!("  | {}^\n", " ".repeat(12))), "{msg}");
    Ok(())
}

#[test]
fn lexer_tokens() -> Result<()> {
    let source = Source::from_contents("/t.a[1:$x]{b=='c'}")?;
    let mut lexer = Lexer::new(&source);
    let mut tokens = vec![];
    loop {
        let tok = lexer.next_token()?;
        if tok.0 == TokenKind::Eof {
            break;
        }
        tokens.push((tok.0, tok.1.text().to_string()));
    }

    let expected = [
        (TokenKind::Topic, "/t"),
        (TokenKind::Symbol, "."),
        (TokenKind::Ident, "a"),
        (TokenKind::Symbol, "["),
        (TokenKind::Number, "1"),
        (TokenKind::Symbol, ":"),
        (TokenKind::Symbol, "$"),
        (TokenKind::Ident, "x"),
        (TokenKind::Symbol, "]"),
        (TokenKind::Symbol, "{"),
        (TokenKind::Ident, "b"),
        (TokenKind::Symbol, "=="),
        (TokenKind::String, "c"),
        (TokenKind::Symbol, "}"),
    ];
    assert_eq!(tokens.len(), expected.len());
    for ((kind, text), (want_kind, want_text)) in tokens.iter().zip(expected.iter()) {
        assert_eq!(kind, want_kind);
        assert_eq!(text, want_text);
    }
    Ok(())
}
