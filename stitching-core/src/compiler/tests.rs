use std::sync::Arc;

use apollo_compiler::Name;
use apollo_compiler::Schema;
use apollo_compiler::ast;
use apollo_compiler::ast::OperationType;
use apollo_compiler::name;
use apollo_compiler::ty;
use apollo_compiler::validation::Valid;
use pretty_assertions::assert_eq;
use serde_json_bytes::json;

use super::*;
use crate::configuration::CompilerConfig;
use crate::normalized::NormalizedFieldBuilder;
use crate::normalized::NormalizedInputValue;

const PETS_SCHEMA: &str = r#"
type Query {
  pet(id: ID): Pet
  pets(filter: PetFilter, first: Int): [Pet!]!
  human(id: ID!): Human
}

type Mutation {
  adopt(petId: ID!, humanId: ID!): Human
}

interface Pet {
  name: String
  owner: Human
}

type Dog implements Pet {
  name: String
  owner: Human
  barks: Boolean
}

type Cat implements Pet {
  name: String
  owner: Human
  livesLeft: Int
}

type Human {
  name: String
  pets(first: Int): [Pet]
  friend: Human
}

input PetFilter {
  name: String
  kinds: [String!]
}
"#;

fn schema() -> Valid<Schema> {
    Schema::parse_and_validate(PETS_SCHEMA, "pets.graphql").unwrap()
}

fn field(name: Name, types: &[Name]) -> NormalizedFieldBuilder {
    NormalizedField::builder(name).object_types(types.iter().cloned())
}

fn id(value: &str) -> NormalizedInputValue {
    NormalizedInputValue::literal(ty!(ID), ast::Value::String(value.into()))
}

/// Compares documents through the same printer, so only structure matters.
#[track_caller]
fn assert_document(operation: &CompiledOperation, expected: &str) {
    let expected = ast::Document::parse(expected, "expected.graphql").unwrap();
    assert_eq!(operation.to_string(), expected.to_string());
}

/// `pet(id: "42")` with `name` on Dog and Cat, and `livesLeft` on Cat only.
fn pet_with_conditional_children() -> Arc<NormalizedField> {
    field(name!("pet"), &[name!("Query")])
        .argument(name!("id"), id("42"))
        .child(field(name!("name"), &[name!("Dog"), name!("Cat")]))
        .child(field(name!("livesLeft"), &[name!("Cat")]))
        .build()
}

#[test]
fn groups_conditional_fields_into_one_fragment_per_type() {
    let operation = compile(
        &schema(),
        &[pet_with_conditional_children()],
        OperationType::Query,
        None,
        &InlineAll,
    )
    .unwrap();

    assert_document(
        &operation,
        r#"{ pet(id: "42") { ... on Dog { name } ... on Cat { name livesLeft } } }"#,
    );
    assert!(operation.variable_definitions().is_empty());
    assert!(operation.variables().is_empty());
}

#[test]
fn extracts_arguments_marked_by_the_policy() {
    let operation = compile(
        &schema(),
        &[pet_with_conditional_children()],
        OperationType::Query,
        None,
        &ExtractAll,
    )
    .unwrap();

    assert_document(
        &operation,
        r#"query($v0: ID) { pet(id: $v0) { ... on Dog { name } ... on Cat { name livesLeft } } }"#,
    );
    assert_eq!(
        serde_json_bytes::Value::Object(operation.variables().clone()),
        json!({ "v0": "42" })
    );
}

#[test]
fn mirrors_unambiguous_trees_in_order() {
    let human = field(name!("human"), &[name!("Query")])
        .alias(name!("me"))
        .argument(
            name!("id"),
            NormalizedInputValue::literal(ty!(ID!), ast::Value::String("1".into())),
        )
        .child(field(name!("name"), &[name!("Human")]))
        .child(
            field(name!("friend"), &[name!("Human")])
                .alias(name!("bestFriend"))
                .child(field(name!("name"), &[name!("Human")]).alias(name!("nickname")))
                .child(field(name!("friend"), &[name!("Human")]).child(field(
                    name!("name"),
                    &[name!("Human")],
                ))),
        )
        .build();

    let operation = compile(
        &schema(),
        &[human],
        OperationType::Query,
        Some(name!("Me")),
        &InlineAll,
    )
    .unwrap();

    assert_document(
        &operation,
        r#"query Me { me: human(id: "1") { name bestFriend: friend { nickname: name friend { name } } } }"#,
    );
}

#[test]
fn direct_fields_come_before_fragments_and_fragments_keep_first_seen_order() {
    let owner = field(name!("owner"), &[name!("Cat"), name!("Dog")])
        .child(field(name!("name"), &[name!("Human")]));
    let pets = field(name!("pets"), &[name!("Query")])
        .argument(
            name!("first"),
            NormalizedInputValue::literal(ty!(Int), ast::Value::Int(2.into())),
        )
        .child(field(name!("livesLeft"), &[name!("Cat")]))
        .child(owner)
        .child(field(name!("barks"), &[name!("Dog")]))
        .child(field(name!("name"), &[name!("Pet")]))
        .build();
    let human = field(name!("human"), &[name!("Query")])
        .argument(
            name!("id"),
            NormalizedInputValue::literal(ty!(ID!), ast::Value::String("1".into())),
        )
        .child(field(name!("name"), &[name!("Human")]))
        .build();

    let operation = compile(
        &schema(),
        &[pets, human],
        OperationType::Query,
        None,
        &InlineAll,
    )
    .unwrap();

    assert_document(
        &operation,
        r#"
        {
          pets(first: 2) {
            name
            ... on Cat { livesLeft owner { name } }
            ... on Dog { owner { name } barks }
          }
          human(id: "1") { name }
        }
        "#,
    );
}

#[test]
fn conditional_detection_does_not_depend_on_type_set_order() {
    // `friend` is declared as `Human`, so a field applying to exactly `Human` is never conditional,
    // while one that also applies to another type always is.
    let human_name = || field(name!("name"), &[name!("Human")]);
    let friend = field(name!("human"), &[name!("Query")])
        .argument(
            name!("id"),
            NormalizedInputValue::literal(ty!(ID!), ast::Value::String("1".into())),
        )
        .child(field(name!("friend"), &[name!("Human")]).child(human_name()))
        .build();
    let operation = compile(&schema(), &[friend], OperationType::Query, None, &InlineAll).unwrap();
    assert_document(&operation, r#"{ human(id: "1") { friend { name } } }"#);

    let pet_with_owner = |types: &[Name]| {
        field(name!("pet"), &[name!("Query")])
            .child(field(name!("owner"), types).child(human_name()))
            .build()
    };
    let operation = compile(
        &schema(),
        &[pet_with_owner(&[name!("Dog"), name!("Cat")])],
        OperationType::Query,
        None,
        &InlineAll,
    )
    .unwrap();
    let reversed = compile(
        &schema(),
        &[pet_with_owner(&[name!("Cat"), name!("Dog")])],
        OperationType::Query,
        None,
        &InlineAll,
    )
    .unwrap();
    assert_document(
        &operation,
        "{ pet { ... on Dog { owner { name } } ... on Cat { owner { name } } } }",
    );
    assert_document(
        &reversed,
        "{ pet { ... on Cat { owner { name } } ... on Dog { owner { name } } } }",
    );
}

#[test]
fn reuses_variables_for_identical_values() {
    let adopt = |alias: Name, pet: &str| {
        field(name!("adopt"), &[name!("Mutation")])
            .alias(alias)
            .argument(
                name!("petId"),
                NormalizedInputValue::literal(ty!(ID!), ast::Value::String(pet.into())),
            )
            .argument(
                name!("humanId"),
                NormalizedInputValue::literal(ty!(ID!), ast::Value::String("h1".into())),
            )
            .child(field(name!("name"), &[name!("Human")]))
            .build()
    };
    let operation = compile(
        &schema(),
        &[adopt(name!("first"), "p1"), adopt(name!("second"), "p2")],
        OperationType::Mutation,
        Some(name!("Adopt")),
        &ExtractAll,
    )
    .unwrap();

    assert_document(
        &operation,
        r#"
        mutation Adopt($v0: ID!, $v1: ID!, $v2: ID!) {
          first: adopt(petId: $v0, humanId: $v1) { name }
          second: adopt(petId: $v2, humanId: $v1) { name }
        }
        "#,
    );
    assert_eq!(
        serde_json_bytes::Value::Object(operation.variables().clone()),
        json!({ "v0": "p1", "v1": "h1", "v2": "p2" })
    );
}

#[test]
fn policy_sees_each_argument_and_can_extract_some() {
    let filter = NormalizedInputValue::object(
        ty!(PetFilter),
        [
            (
                name!("name"),
                NormalizedInputValue::literal(ty!(String), ast::Value::String("Rex".into())),
            ),
            (
                name!("kinds"),
                NormalizedInputValue::list(
                    ty!([String!]),
                    [NormalizedInputValue::literal(
                        ty!(String!),
                        ast::Value::String("DOG".into()),
                    )],
                ),
            ),
        ],
    );
    let pets = field(name!("pets"), &[name!("Query")])
        .argument(name!("filter"), filter)
        .argument(
            name!("first"),
            NormalizedInputValue::literal(ty!(Int), ast::Value::Int(10.into())),
        )
        .child(field(name!("name"), &[name!("Dog"), name!("Cat")]))
        .build();
    let only_filters = |_: &NormalizedField, argument: &Name, _: &NormalizedInputValue| {
        argument.as_str() == "filter"
    };

    let compiler = OperationCompiler::new(CompilerConfig {
        variable_prefix: "arg".to_string(),
    });
    let operation = compiler
        .compile(&schema(), &[pets], OperationType::Query, None, &only_filters)
        .unwrap();

    assert_document(
        &operation,
        "query($arg0: PetFilter) { pets(filter: $arg0, first: 10) { ... on Dog { name } ... on Cat { name } } }",
    );
    assert_eq!(
        serde_json_bytes::Value::Object(operation.variables().clone()),
        json!({ "arg0": { "name": "Rex", "kinds": ["DOG"] } })
    );
}

#[test]
fn builds_the_request_body() {
    let operation = compile(
        &schema(),
        &[pet_with_conditional_children()],
        OperationType::Query,
        Some(name!("PetQuery")),
        &ExtractAll,
    )
    .unwrap();
    let request = operation.to_request();

    let expected = ast::Document::parse(
        r#"query PetQuery($v0: ID) { pet(id: $v0) { ... on Dog { name } ... on Cat { name livesLeft } } }"#,
        "expected.graphql",
    )
    .unwrap();
    assert_eq!(request.query, expected.serialize().no_indent().to_string());
    assert_eq!(request.operation_name.as_deref(), Some("PetQuery"));
    assert_eq!(
        serde_json::to_value(&request).unwrap()["variables"],
        serde_json::json!({ "v0": "42" })
    );
}

#[test]
fn rejects_fields_without_object_types() {
    let pet = field(name!("pet"), &[name!("Query")])
        .child(field(name!("name"), &[]))
        .build();
    let error = compile(&schema(), &[pet], OperationType::Query, None, &InlineAll).unwrap_err();
    assert_eq!(
        error,
        StitchingError::EmptyObjectTypeNames {
            field_name: name!("name")
        }
    );
}

#[test]
fn rejects_selections_on_unknown_fields() {
    let pet = field(name!("pet"), &[name!("Query")])
        .child(
            field(name!("collar"), &[name!("Dog")])
                .child(field(name!("color"), &[name!("Collar")])),
        )
        .build();
    let error = compile(&schema(), &[pet], OperationType::Query, None, &InlineAll).unwrap_err();
    assert_eq!(
        error,
        StitchingError::UnknownField {
            type_name: name!("Dog"),
            field_name: name!("collar"),
        }
    );
}

#[test]
fn rejects_operations_without_a_root_type() {
    let field = field(name!("onPet"), &[name!("Subscription")]).build();
    let error = compile(&schema(), &[field], OperationType::Subscription, None, &InlineAll)
        .unwrap_err();
    assert_eq!(
        error,
        StitchingError::MissingRootType {
            operation_type: "subscription"
        }
    );
}

#[test]
fn concurrent_compilations_are_independent() {
    let schema = Arc::new(schema());
    let handles: Vec<_> = (0..4)
        .map(|i| {
            let schema = Arc::clone(&schema);
            std::thread::spawn(move || {
                let pet = field(name!("pet"), &[name!("Query")])
                    .argument(name!("id"), id(&i.to_string()))
                    .child(field(name!("name"), &[name!("Dog")]))
                    .build();
                compile(&schema, &[pet], OperationType::Query, None, &ExtractAll).unwrap()
            })
        })
        .collect();

    for (i, handle) in handles.into_iter().enumerate() {
        let operation = handle.join().unwrap();
        assert_eq!(
            serde_json_bytes::Value::Object(operation.variables().clone()),
            json!({ "v0": i.to_string() })
        );
    }
}
