use indexmap::IndexMap;
use pretty_assertions::assert_eq;
use rstest::{fixture, rstest};

use schema_compare::{
    Column, ColumnType, Comparator, DatabaseSchema, ForeignKeyConstraint, Identifier, Index,
    ReferentialAction, Sequence,
};

fn column(name: &str, column_type: ColumnType) -> Column {
    Column::new(name, column_type)
}

#[fixture]
fn shop() -> DatabaseSchema {
    let mut schema = DatabaseSchema::new(None);

    let customers = schema.create_table("customers").unwrap();
    customers
        .add_column(column("id", ColumnType::Integer).autoincrement(true))
        .unwrap();
    customers
        .add_column(column("name", ColumnType::String).length(100))
        .unwrap();
    customers.set_primary_key(&["id"], None).unwrap();

    let orders = schema.create_table("orders").unwrap();
    orders
        .add_column(column("id", ColumnType::Integer).autoincrement(true))
        .unwrap();
    orders
        .add_column(column("customer_id", ColumnType::Integer))
        .unwrap();
    orders
        .add_column(column("total", ColumnType::Decimal).precision(12).scale(2))
        .unwrap();
    orders.set_primary_key(&["id"], None).unwrap();
    orders
        .add_foreign_key(
            ForeignKeyConstraint::new("fk_orders_customer", &["customer_id"], "customers", &["id"])
                .unwrap()
                .delete_action(ReferentialAction::Cascade),
        )
        .unwrap();

    schema.create_table("audit.events").unwrap()
        .add_column(column("id", ColumnType::BigInt))
        .unwrap();

    schema.add_sequence(Sequence::new("invoice_seq").allocation_size(10)).unwrap();
    schema.add_sequence(Sequence::new("orders_id_seq")).unwrap();

    schema
}

#[rstest]
fn comparing_a_schema_with_itself_is_empty(shop: DatabaseSchema) {
    let diff = Comparator::compare_schemas(&shop, &shop);
    assert!(diff.is_empty());

    let copy = shop.clone();
    let diff = Comparator::compare_schemas(&shop, &copy);
    assert!(diff.new_tables.is_empty());
    assert!(diff.changed_tables.is_empty());
    assert!(diff.removed_tables.is_empty());
    assert!(diff.new_sequences.is_empty());
    assert!(diff.changed_sequences.is_empty());
    assert!(diff.removed_sequences.is_empty());
    assert!(diff.new_namespaces.is_empty());
    assert!(diff.removed_namespaces.is_empty());
}

#[rstest]
fn added_and_removed_tables_are_reported_once(shop: DatabaseSchema) {
    let mut to = shop.clone();
    to.drop_table("audit.events").unwrap();
    to.create_table("invoices")
        .unwrap()
        .add_column(column("id", ColumnType::Integer))
        .unwrap();
    to.table_mut("customers")
        .unwrap()
        .add_column(column("email", ColumnType::String).not_null(false))
        .unwrap();

    let diff = Comparator::compare_schemas(&shop, &to);

    assert_eq!(diff.new_tables.keys().collect::<Vec<_>>(), vec!["invoices"]);
    assert_eq!(diff.removed_tables.keys().collect::<Vec<_>>(), vec!["audit.events"]);
    assert_eq!(diff.changed_tables.keys().collect::<Vec<_>>(), vec!["customers"]);

    for name in diff.new_tables.keys() {
        assert!(!diff.removed_tables.contains_key(name));
        assert!(!diff.changed_tables.contains_key(name));
    }
    for name in diff.removed_tables.keys() {
        assert!(!diff.changed_tables.contains_key(name));
    }
}

#[rstest]
fn namespaces_are_diffed(shop: DatabaseSchema) {
    let mut to = shop.clone();
    to.drop_table("audit.events").unwrap();
    let mut from = shop;
    from.drop_table("audit.events").unwrap();
    to.create_namespace("reporting").unwrap();

    let diff = Comparator::compare_schemas(&from, &to);
    assert_eq!(diff.new_namespaces, vec!["reporting".to_string()]);
    assert!(diff.removed_namespaces.is_empty());

    let diff = Comparator::compare_schemas(&to, &from);
    assert_eq!(diff.removed_namespaces, vec!["reporting".to_string()]);
}

#[test]
fn column_rename_is_detected() {
    let mut from = DatabaseSchema::new(None);
    from.create_table("accounts")
        .unwrap()
        .add_column(column("old_name", ColumnType::Integer))
        .unwrap();

    let mut to = DatabaseSchema::new(None);
    to.create_table("accounts")
        .unwrap()
        .add_column(column("new_name", ColumnType::Integer))
        .unwrap();

    let diff = Comparator::compare_schemas(&from, &to);
    let table_diff = &diff.changed_tables["accounts"];

    assert!(table_diff.added_columns.is_empty());
    assert!(table_diff.removed_columns.is_empty());
    assert_eq!(
        table_diff.renamed_columns["old_name"],
        column("new_name", ColumnType::Integer)
    );
}

#[test]
fn ambiguous_rename_stays_add_and_remove() {
    let mut from = DatabaseSchema::new(None);
    let table = from.create_table("t").unwrap();
    table.add_column(column("a", ColumnType::Integer)).unwrap();
    table.add_column(column("b", ColumnType::Integer)).unwrap();

    let mut to = DatabaseSchema::new(None);
    to.create_table("t")
        .unwrap()
        .add_column(column("c", ColumnType::Integer))
        .unwrap();

    let diff = Comparator::compare_schemas(&from, &to);
    let table_diff = &diff.changed_tables["t"];

    assert!(table_diff.renamed_columns.is_empty());
    assert!(table_diff.added_columns.contains_key("c"));
    assert!(table_diff.removed_columns.contains_key("a"));
    assert!(table_diff.removed_columns.contains_key("b"));
}

#[test]
fn removed_column_is_renamed_at_most_once() {
    let mut from = DatabaseSchema::new(None);
    from.create_table("t")
        .unwrap()
        .add_column(column("a", ColumnType::Integer))
        .unwrap();

    let mut to = DatabaseSchema::new(None);
    let table = to.create_table("t").unwrap();
    table.add_column(column("b", ColumnType::Integer)).unwrap();
    table.add_column(column("c", ColumnType::Integer)).unwrap();

    let diff = Comparator::compare_schemas(&from, &to);
    let table_diff = &diff.changed_tables["t"];

    assert_eq!(table_diff.renamed_columns.len(), 1);
    assert_eq!(
        table_diff.renamed_columns["a"].name,
        Identifier::parse("b")
    );
    assert_eq!(table_diff.added_columns.keys().collect::<Vec<_>>(), vec!["c"]);
    assert!(table_diff.removed_columns.is_empty());
}

#[test]
fn ambiguous_index_rename_stays_add_and_remove() {
    let mut from = DatabaseSchema::new(None);
    let table = from.create_table("posts").unwrap();
    table.add_column(column("slug", ColumnType::String)).unwrap();
    table
        .add_index(&["slug"], Some("idx_slug_a"), &[], IndexMap::new())
        .unwrap();
    table
        .add_index(&["slug"], Some("idx_slug_b"), &[], IndexMap::new())
        .unwrap();

    let mut to = DatabaseSchema::new(None);
    let table = to.create_table("posts").unwrap();
    table.add_column(column("slug", ColumnType::String)).unwrap();
    table
        .add_index(&["slug"], Some("idx_posts_slug"), &[], IndexMap::new())
        .unwrap();

    let diff = Comparator::compare_schemas(&from, &to);
    let posts = &diff.changed_tables["posts"];

    assert!(posts.renamed_indexes.is_empty());
    assert_eq!(posts.added_indexes.keys().collect::<Vec<_>>(), vec!["idx_posts_slug"]);
    assert_eq!(
        posts.removed_indexes.keys().collect::<Vec<_>>(),
        vec!["idx_slug_a", "idx_slug_b"]
    );
}

#[rstest]
#[case(None, Some(""), false)]
#[case(Some(""), None, false)]
#[case(Some("note"), None, true)]
#[case(Some("note"), Some("Note"), true)]
fn comment_comparison(
    #[case] from_comment: Option<&str>,
    #[case] to_comment: Option<&str>,
    #[case] changed: bool,
) {
    let mut from = column("c", ColumnType::Text);
    from.comment = from_comment.map(str::to_string);
    let mut to = column("c", ColumnType::Text);
    to.comment = to_comment.map(str::to_string);

    let properties = Comparator::new().diff_column(&from, &to);
    assert_eq!(properties.contains(&"comment".to_string()), changed);
}

#[test]
fn missing_default_and_empty_default_differ() {
    let from = column("c", ColumnType::String);
    let to = column("c", ColumnType::String).default_value("");

    let properties = Comparator::new().diff_column(&from, &to);
    assert_eq!(properties, vec!["default".to_string()]);
}

#[test]
fn index_equality_ignores_name() {
    let a = Index::new("idx_email", &["email"], false, false).with_flags(&["FULLTEXT"]);
    let b = Index::new("ix_mail_lookup", &["Email"], false, false).with_flags(&["fulltext"]);
    assert!(!Comparator::new().diff_index(&a, &b));

    let c = b.clone().with_flags(&["spatial"]);
    assert!(Comparator::new().diff_index(&a, &c));
}

#[test]
fn partial_and_prefix_indexes_are_compared() {
    let plain = Index::new("idx", &["email"], false, false);
    let partial = plain
        .clone()
        .with_option("where", "deleted_at IS NULL");
    let prefixed = plain.clone().with_option("lengths", serde_json::json!([10]));

    assert!(Comparator::new().diff_index(&plain, &partial));
    assert!(Comparator::new().diff_index(&plain, &prefixed));
}

#[rstest]
fn dropping_a_referenced_table_orphans_its_foreign_keys(shop: DatabaseSchema) {
    let mut to = shop.clone();
    to.drop_table("customers").unwrap();

    let diff = Comparator::compare_schemas(&shop, &to);

    assert!(diff.removed_tables.contains_key("customers"));
    assert_eq!(diff.orphaned_foreign_keys.len(), 1);
    assert_eq!(
        diff.orphaned_foreign_keys[0].name,
        Identifier::parse("fk_orders_customer")
    );
    if let Some(orders) = diff.changed_tables.get("orders") {
        assert!(orders
            .removed_foreign_keys
            .iter()
            .all(|key| key.name != Identifier::parse("fk_orders_customer")));
    }
}

#[rstest]
fn orphaned_key_is_not_also_dropped_by_the_owning_table(shop: DatabaseSchema) {
    let mut to = shop.clone();
    to.drop_table("customers").unwrap();
    to.table_mut("orders")
        .unwrap()
        .remove_foreign_key("fk_orders_customer")
        .unwrap();

    let diff = Comparator::compare_schemas(&shop, &to);

    assert_eq!(diff.orphaned_foreign_keys.len(), 1);
    let orders = &diff.changed_tables["orders"];
    assert!(orders.removed_foreign_keys.is_empty());
}

#[rstest]
fn dropping_both_tables_orphans_nothing(shop: DatabaseSchema) {
    let mut to = shop.clone();
    to.drop_table("customers").unwrap();
    to.drop_table("orders").unwrap();

    let diff = Comparator::compare_schemas(&shop, &to);
    assert_eq!(diff.removed_tables.len(), 2);
    assert!(diff.orphaned_foreign_keys.is_empty());
}

#[rstest]
fn foreign_key_action_change(shop: DatabaseSchema) {
    let mut to = shop.clone();
    let orders = to.table_mut("orders").unwrap();
    orders.remove_foreign_key("fk_orders_customer").unwrap();
    orders
        .add_foreign_key(
            ForeignKeyConstraint::new("fk_orders_customer", &["customer_id"], "customers", &["id"])
                .unwrap()
                .delete_action(ReferentialAction::Restrict),
        )
        .unwrap();

    let diff = Comparator::compare_schemas(&shop, &to);
    let orders = &diff.changed_tables["orders"];

    assert_eq!(orders.changed_foreign_keys.len(), 1);
    assert_eq!(orders.changed_foreign_keys[0].on_delete(), None);
    assert!(orders.added_foreign_keys.is_empty());
    assert!(orders.removed_foreign_keys.is_empty());
}

#[rstest]
fn sequences_are_diffed(shop: DatabaseSchema) {
    let mut to = shop.clone();
    to.drop_sequence("invoice_seq").unwrap();
    to.add_sequence(Sequence::new("invoice_seq").allocation_size(20)).unwrap();
    to.add_sequence(Sequence::new("ticket_seq")).unwrap();

    let diff = Comparator::compare_schemas(&shop, &to);
    assert_eq!(diff.changed_sequences.len(), 1);
    assert_eq!(diff.changed_sequences[0].allocation_size, 20);
    assert_eq!(diff.new_sequences.len(), 1);
    assert!(diff.removed_sequences.is_empty());
}

#[rstest]
fn autoincrement_sequences_follow_their_table(shop: DatabaseSchema) {
    // orders_id_seq backs orders.id, so it is neither new nor removed on its own
    let mut from = shop.clone();
    from.drop_sequence("orders_id_seq").unwrap();

    let diff = Comparator::compare_schemas(&from, &shop);
    assert!(diff.new_sequences.is_empty());

    let diff = Comparator::compare_schemas(&shop, &from);
    assert!(diff.removed_sequences.is_empty());
}

#[test]
fn end_to_end_users_scenario() {
    let mut from = DatabaseSchema::new(None);
    let users = from.create_table("users").unwrap();
    users.add_column(column("id", ColumnType::Integer)).unwrap();
    users
        .add_column(column("email", ColumnType::String).length(255))
        .unwrap();
    users.set_primary_key(&["id"], None).unwrap();

    let mut to = DatabaseSchema::new(None);
    let users = to.create_table("users").unwrap();
    users.add_column(column("id", ColumnType::Integer)).unwrap();
    users
        .add_column(column("email_address", ColumnType::String).length(255))
        .unwrap();
    users
        .add_column(column("created_at", ColumnType::DateTime).default_value("2020-01-01"))
        .unwrap();
    users.set_primary_key(&["id"], None).unwrap();

    let diff = Comparator::compare_schemas(&from, &to);
    let users = &diff.changed_tables["users"];

    assert_eq!(users.renamed_columns.len(), 1);
    assert_eq!(
        users.renamed_columns["email"].name,
        Identifier::parse("email_address")
    );
    assert_eq!(users.added_columns.keys().collect::<Vec<_>>(), vec!["created_at"]);
    assert!(users.added_columns["created_at"].not_null);
    assert!(users.removed_columns.is_empty());
    assert!(users.changed_columns.is_empty());
    assert!(users.added_indexes.is_empty());
}

#[test]
fn index_changes_and_renames() {
    let mut from = DatabaseSchema::new(None);
    let table = from.create_table("posts").unwrap();
    table.add_column(column("slug", ColumnType::String)).unwrap();
    table.add_column(column("title", ColumnType::String)).unwrap();
    table
        .add_index(&["slug"], Some("idx_slug"), &[], IndexMap::new())
        .unwrap();
    table
        .add_index(&["title"], Some("idx_title"), &[], IndexMap::new())
        .unwrap();

    let mut to = DatabaseSchema::new(None);
    let table = to.create_table("posts").unwrap();
    table.add_column(column("slug", ColumnType::String)).unwrap();
    table.add_column(column("title", ColumnType::String)).unwrap();
    table
        .add_unique_index(&["slug"], Some("idx_slug"), IndexMap::new())
        .unwrap();
    table
        .add_index(&["title"], Some("idx_posts_title"), &[], IndexMap::new())
        .unwrap();

    let diff = Comparator::compare_schemas(&from, &to);
    let posts = &diff.changed_tables["posts"];

    assert!(posts.changed_indexes["idx_slug"].unique);
    assert_eq!(
        posts.renamed_indexes["idx_title"].name,
        Identifier::parse("idx_posts_title")
    );
    assert!(posts.added_indexes.is_empty());
    assert!(posts.removed_indexes.is_empty());
}

#[test]
fn diff_records_serialize() {
    let mut from = DatabaseSchema::new(None);
    from.create_table("t")
        .unwrap()
        .add_column(column("a", ColumnType::Integer))
        .unwrap();
    let mut to = DatabaseSchema::new(None);
    to.create_table("t")
        .unwrap()
        .add_column(column("a", ColumnType::BigInt))
        .unwrap();

    let diff = Comparator::compare_schemas(&from, &to);
    let json = serde_json::to_value(&diff).unwrap();

    assert_eq!(
        json["changed_tables"]["t"]["changed_columns"]["a"]["changed_properties"],
        serde_json::json!(["type"])
    );
    assert_eq!(
        json["changed_tables"]["t"]["changed_columns"]["a"]["column"]["type"],
        "bigint"
    );
}
