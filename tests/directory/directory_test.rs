//! Tests for the TOML-backed customer directory and query personalisation.

use ticketline::directory::{
    personalised_query, Customer, CustomerDirectory, DirectoryError, StaticDirectory,
};

#[tokio::test]
async fn load_and_lookup_from_file() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("customers.toml");
    std::fs::write(
        &path,
        r#"
[[customers]]
id = "C42"
name = "Ada"
email = "ada@example.com"

[[customers]]
id = " C7 "
name = "Grace"
"#,
    )
    .expect("write directory");

    let directory = StaticDirectory::load(&path).expect("directory loads");
    assert_eq!(directory.len(), 2);

    let ada = directory.lookup("C42").await.expect("lookup");
    assert_eq!(
        ada,
        Some(Customer {
            id: "C42".to_owned(),
            name: "Ada".to_owned(),
            email: Some("ada@example.com".to_owned()),
        })
    );

    let grace = directory.lookup(" C7").await.expect("lookup");
    assert_eq!(grace.map(|c| c.name), Some("Grace".to_owned()));

    assert_eq!(directory.lookup("C999").await.expect("lookup"), None);
}

#[test]
fn missing_file_is_an_io_error() {
    let dir = tempfile::tempdir().expect("tempdir");
    let result = StaticDirectory::load(&dir.path().join("absent.toml"));
    assert!(matches!(result, Err(DirectoryError::Io { .. })));
}

#[test]
fn malformed_file_is_a_parse_error() {
    let result = StaticDirectory::from_toml("[[customers]]\nid = 5");
    assert!(matches!(result, Err(DirectoryError::Parse { .. })));
}

#[test]
fn personalised_query_prefixes_name() {
    let customer = Customer {
        id: "C42".to_owned(),
        name: "Ada".to_owned(),
        email: None,
    };
    assert_eq!(
        personalised_query(&customer, "where is my order"),
        "Ada's query: where is my order"
    );
}
