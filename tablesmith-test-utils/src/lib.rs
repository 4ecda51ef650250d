//! Tablesmith Test Utilities
//!
//! Shared test infrastructure for the Tablesmith workspace:
//! - Proptest generators for column specs and catalog shapes
//! - Catalog fixtures scripted onto `MockSession`

// Re-export the mock session from its source crate
pub use tablesmith_session::{MockSession, RowSet, SessionEvent, Value};

// Re-export core types for convenience
pub use tablesmith_core::{
    Anchor, BaseType, ColumnChange, ColumnSpec, ColumnType, DefaultValue, ExistingColumn,
    MutationPlan, QualifiedName, RebuildState, TablesmithError, TablesmithResult,
};

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

pub mod generators {
    use super::*;
    use proptest::prelude::*;
    use tablesmith_core::Identity;

    /// A plain identifier that needs no escaping.
    pub fn arb_column_name() -> impl Strategy<Value = String> {
        "[A-Za-z][A-Za-z0-9_]{0,20}"
    }

    pub fn arb_base_type() -> impl Strategy<Value = BaseType> {
        prop::sample::select(BaseType::ALL.to_vec())
    }

    /// A column type whose parameters fit its base type.
    pub fn arb_column_type() -> impl Strategy<Value = ColumnType> {
        arb_base_type().prop_flat_map(|base| {
            let parameters: BoxedStrategy<Option<String>> = match base {
                BaseType::Char
                | BaseType::VarChar
                | BaseType::NChar
                | BaseType::NVarChar
                | BaseType::Binary
                | BaseType::VarBinary => prop_oneof![
                    Just(None),
                    Just(Some("max".to_string())),
                    (1u32..=4000).prop_map(|n| Some(n.to_string())),
                ]
                .boxed(),
                BaseType::Decimal | BaseType::Numeric => (1u32..=38)
                    .prop_flat_map(|p| (Just(p), 0..=p))
                    .prop_map(|(p, s)| Some(format!("{p},{s}")))
                    .boxed(),
                BaseType::DateTime2 | BaseType::Time | BaseType::DateTimeOffset => {
                    prop::option::of((0u32..=7).prop_map(|s| s.to_string())).boxed()
                }
                BaseType::Float => {
                    prop::option::of((1u32..=53).prop_map(|p| p.to_string())).boxed()
                }
                _ => Just(None).boxed(),
            };
            parameters.prop_map(move |p| match p {
                Some(p) => ColumnType::with_parameters(base, p),
                None => ColumnType::new(base),
            })
        })
    }

    /// A default that validates against `column_type`.
    pub fn arb_default_for(column_type: &ColumnType) -> BoxedStrategy<DefaultValue> {
        let family = column_type.family();
        if column_type.base == BaseType::Bit {
            prop::sample::select(vec!["0", "1"])
                .prop_map(|v| DefaultValue::Literal(v.to_string()))
                .boxed()
        } else if family.is_numeric() {
            (-1000i64..1000)
                .prop_map(|v| DefaultValue::Literal(v.to_string()))
                .boxed()
        } else {
            prop_oneof![
                "[A-Za-z0-9 ']{0,12}".prop_map(DefaultValue::Literal),
                prop::sample::select(tablesmith_core::NILADIC_DEFAULTS.to_vec())
                    .prop_map(|n| DefaultValue::Expression(n.to_string())),
            ]
            .boxed()
        }
    }

    pub fn arb_anchor(existing: Vec<String>) -> impl Strategy<Value = Anchor> {
        if existing.is_empty() {
            return prop_oneof![Just(Anchor::AtStart), Just(Anchor::AtEnd)].boxed();
        }
        prop_oneof![
            Just(Anchor::AtStart),
            Just(Anchor::AtEnd),
            prop::sample::select(existing).prop_map(Anchor::After),
            Just(Anchor::After("no_such_column".to_string())),
        ]
        .boxed()
    }

    /// A valid column spec anchored among `existing`.
    pub fn arb_column_spec(existing: Vec<String>) -> impl Strategy<Value = ColumnSpec> {
        (arb_column_name(), arb_column_type(), any::<bool>(), arb_anchor(existing)).prop_flat_map(
            |(name, column_type, nullable, anchor)| {
                let default = prop::option::of(arb_default_for(&column_type));
                (
                    Just(name),
                    Just(column_type),
                    Just(nullable),
                    Just(anchor),
                    default,
                )
            },
        )
        .prop_map(|(name, column_type, nullable, anchor, default)| ColumnSpec {
            name,
            column_type,
            nullable,
            default,
            anchor,
        })
    }

    /// Columns as the catalog reports them, with distinct names and
    /// ordinals starting at 1.
    pub fn arb_existing_columns() -> impl Strategy<Value = Vec<ExistingColumn>> {
        prop::collection::btree_set("[a-z][a-z0-9_]{0,10}", 1..8)
            .prop_flat_map(|names| {
                let count = names.len();
                (
                    Just(names),
                    prop::collection::vec((arb_column_type(), any::<bool>()), count),
                    prop::option::of(0..count),
                )
            })
            .prop_map(|(names, shapes, identity_at)| {
                names
                    .into_iter()
                    .zip(shapes)
                    .enumerate()
                    .map(|(i, (name, (column_type, nullable)))| ExistingColumn {
                        name,
                        type_text: column_type.to_string(),
                        nullable,
                        default_definition: String::new(),
                        default_constraint: None,
                        ordinal_position: i as i32 + 1,
                        identity: (identity_at == Some(i)).then(|| Identity {
                            seed: "1".to_string(),
                            increment: "1".to_string(),
                        }),
                        computed: None,
                    })
                    .collect()
            })
    }
}

// ============================================================================
// CATALOG FIXTURES
// ============================================================================

pub mod fixtures {
    use super::*;
    use tablesmith_catalog::queries;

    /// One `sys.columns` row as the column listing query returns it.
    #[derive(Debug, Clone)]
    pub struct CatalogColumn {
        pub name: String,
        pub type_name: String,
        pub max_length: i64,
        pub precision: i64,
        pub scale: i64,
        pub nullable: bool,
        pub default_definition: Option<String>,
        pub default_constraint: Option<String>,
        pub identity: Option<(String, String)>,
        /// Definition and persisted flag from `sys.computed_columns`.
        pub computed: Option<(String, bool)>,
    }

    impl CatalogColumn {
        pub fn new(
            name: &str,
            type_name: &str,
            max_length: i64,
            precision: i64,
            scale: i64,
        ) -> Self {
            Self {
                name: name.to_string(),
                type_name: type_name.to_string(),
                max_length,
                precision,
                scale,
                nullable: false,
                default_definition: None,
                default_constraint: None,
                identity: None,
                computed: None,
            }
        }

        pub fn nullable(mut self) -> Self {
            self.nullable = true;
            self
        }

        /// Stored form, e.g. `('USD')` or `(getdate())`.
        pub fn with_default(mut self, definition: &str) -> Self {
            self.default_definition = Some(definition.to_string());
            self
        }

        pub fn with_named_default(mut self, constraint: &str, definition: &str) -> Self {
            self.default_constraint = Some(constraint.to_string());
            self.with_default(definition)
        }

        pub fn identity(mut self, seed: i64, increment: i64) -> Self {
            self.identity = Some((seed.to_string(), increment.to_string()));
            self
        }

        pub fn computed(mut self, definition: &str, persisted: bool) -> Self {
            self.computed = Some((definition.to_string(), persisted));
            self
        }
    }

    fn optional(text: Option<&String>) -> Value {
        text.map(|t| Value::from(t.as_str())).unwrap_or(Value::Null)
    }

    /// Rows for the column listing query, ordinals assigned in order.
    pub fn column_rows(columns: &[CatalogColumn]) -> RowSet {
        let mut rows = RowSet::new(&[
            "column_name",
            "type_name",
            "max_length",
            "precision",
            "scale",
            "is_nullable",
            "ordinal_position",
            "default_definition",
            "default_constraint",
            "identity_seed",
            "identity_increment",
            "computed_definition",
            "is_persisted",
        ]);
        for (i, c) in columns.iter().enumerate() {
            rows.push(vec![
                Value::from(c.name.as_str()),
                Value::from(c.type_name.as_str()),
                Value::Int(c.max_length),
                Value::Int(c.precision),
                Value::Int(c.scale),
                Value::Bool(c.nullable),
                Value::Int(i as i64 + 1),
                optional(c.default_definition.as_ref()),
                optional(c.default_constraint.as_ref()),
                optional(c.identity.as_ref().map(|(seed, _)| seed)),
                optional(c.identity.as_ref().map(|(_, increment)| increment)),
                optional(c.computed.as_ref().map(|(definition, _)| definition)),
                c.computed
                    .as_ref()
                    .map(|(_, persisted)| Value::Bool(*persisted))
                    .unwrap_or(Value::Null),
            ]);
        }
        rows
    }

    pub fn primary_key_rows(name: &str, clustered: bool, columns: &[&str]) -> RowSet {
        let mut rows = RowSet::new(&[
            "constraint_name",
            "is_clustered",
            "column_name",
            "is_descending_key",
        ]);
        for column in columns {
            rows.push(vec![
                name.into(),
                clustered.into(),
                (*column).into(),
                false.into(),
            ]);
        }
        rows
    }

    /// A plain non-unique, non-clustered index over `columns`.
    pub fn index_rows(name: &str, columns: &[&str]) -> RowSet {
        let mut rows = RowSet::new(&[
            "index_name",
            "index_type",
            "is_unique",
            "is_unique_constraint",
            "is_clustered",
            "filter_definition",
            "column_name",
            "is_descending_key",
            "is_included_column",
        ]);
        for column in columns {
            rows.push(vec![
                name.into(),
                Value::Int(2),
                false.into(),
                false.into(),
                false.into(),
                Value::Null,
                (*column).into(),
                false.into(),
                false.into(),
            ]);
        }
        rows
    }

    /// Rows for the guard that lists index kinds a rebuild cannot restore.
    pub fn unsupported_index_rows(indexes: &[(&str, &str)]) -> RowSet {
        let mut rows = RowSet::new(&["index_name", "type_desc"]);
        for (name, type_desc) in indexes {
            rows.push(vec![(*name).into(), (*type_desc).into()]);
        }
        rows
    }

    pub fn check_rows(checks: &[(&str, &str)]) -> RowSet {
        let mut rows = RowSet::new(&["constraint_name", "definition"]);
        for (name, definition) in checks {
            rows.push(vec![(*name).into(), (*definition).into()]);
        }
        rows
    }

    /// Single-column foreign key `parent.parent_column -> referenced.referenced_column`.
    pub fn foreign_key_rows(
        name: &str,
        parent: &QualifiedName,
        parent_column: &str,
        referenced: &QualifiedName,
        referenced_column: &str,
    ) -> RowSet {
        RowSet::new(&[
            "constraint_name",
            "parent_schema",
            "parent_table",
            "parent_column",
            "referenced_schema",
            "referenced_table",
            "referenced_column",
            "on_delete",
            "on_update",
        ])
        .with_row(vec![
            name.into(),
            parent.schema.as_str().into(),
            parent.table.as_str().into(),
            parent_column.into(),
            referenced.schema.as_str().into(),
            referenced.table.as_str().into(),
            referenced_column.into(),
            "CASCADE".into(),
            "NO_ACTION".into(),
        ])
    }

    /// Object-level grants: `(permission, state_desc, grantee)`.
    pub fn permission_rows(grants: &[(&str, &str, &str)]) -> RowSet {
        let mut rows = RowSet::new(&["permission_name", "state_desc", "grantee", "column_name"]);
        for (permission, state, grantee) in grants {
            rows.push(vec![
                (*permission).into(),
                (*state).into(),
                (*grantee).into(),
                Value::Null,
            ]);
        }
        rows
    }

    pub fn exists_rows() -> RowSet {
        RowSet::new(&["object_id"]).with_row(vec![Value::Int(901578250)])
    }

    // ------------------------------------------------------------------------
    // dbo.Orders
    // ------------------------------------------------------------------------

    pub const ORDERS_SHADOW: &str = "[dbo].[Orders_TEMP]";

    pub fn orders_table() -> QualifiedName {
        QualifiedName::new("dbo", "Orders")
    }

    pub fn order_lines_table() -> QualifiedName {
        QualifiedName::new("sales", "OrderLines")
    }

    /// `(Id int NOT NULL, Amount decimal(10,2) NOT NULL)`
    pub fn orders_columns() -> Vec<CatalogColumn> {
        vec![
            CatalogColumn::new("Id", "int", 4, 10, 0),
            CatalogColumn::new("Amount", "decimal", 9, 10, 2),
        ]
    }

    /// The Orders columns after `Currency varchar(3) NOT NULL DEFAULT 'USD'`
    /// was added after `Amount`.
    pub fn orders_columns_with_currency() -> Vec<CatalogColumn> {
        let mut columns = orders_columns();
        columns.push(CatalogColumn::new("Currency", "varchar", 3, 0, 0).with_default("(N'USD')"));
        columns
    }

    /// The `Currency` column request from the Orders scenario.
    pub fn currency_spec() -> ColumnSpec {
        ColumnSpec::new("Currency", ColumnType::with_parameters(BaseType::VarChar, "3"))
            .not_null()
            .with_default(DefaultValue::infer("'USD'"))
            .with_anchor(Anchor::After("Amount".to_string()))
    }

    /// Script the full Orders catalog: clustered `PK_Orders` on `Id`,
    /// `IX_Orders_Id`, a check on `Amount`, an inbound key from
    /// `sales.OrderLines`, and a `SELECT` grant to `reporting`. The column
    /// listing answers with `before` first and `after` from then on.
    pub fn script_orders(
        session: &MockSession,
        before: &[CatalogColumn],
        after: &[CatalogColumn],
    ) {
        let orders = orders_table();
        session
            .respond(queries::TABLE_EXISTS, exists_rows())
            .respond(queries::LIST_COLUMNS, column_rows(before))
            .respond(queries::LIST_COLUMNS, column_rows(after))
            .respond(queries::PRIMARY_KEY, primary_key_rows("PK_Orders", true, &["Id"]))
            .respond(queries::INDEXES, index_rows("IX_Orders_Id", &["Id"]))
            .respond(
                queries::CHECK_CONSTRAINTS,
                check_rows(&[("CK_Orders_Amount", "([Amount]>=(0))")]),
            )
            .respond(
                queries::INBOUND_FOREIGN_KEYS,
                foreign_key_rows(
                    "FK_OrderLines_Orders",
                    &order_lines_table(),
                    "OrderId",
                    &orders,
                    "Id",
                ),
            )
            .respond(
                queries::PERMISSIONS,
                permission_rows(&[("SELECT", "GRANT", "reporting")]),
            );
    }

    /// An open session scripted with the Orders scenario.
    pub fn orders_session() -> MockSession {
        let session = MockSession::new();
        script_orders(&session, &orders_columns(), &orders_columns_with_currency());
        session
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::generators::*;
    use proptest::prelude::*;
    use tablesmith_core::validate_specs;

    #[test]
    fn test_orders_rows_have_ordinals() {
        let rows = column_rows(&orders_columns_with_currency());
        assert_eq!(rows.len(), 3);
        let last = &rows.rows()[2];
        assert_eq!(last.get::<i32>("ordinal_position").unwrap(), 3);
        assert_eq!(
            last.get::<Option<String>>("default_definition").unwrap().as_deref(),
            Some("(N'USD')")
        );
        assert_eq!(last.get::<Option<String>>("identity_seed").unwrap(), None);
    }

    #[test]
    fn test_currency_spec_is_valid() {
        assert!(validate_specs(&[currency_spec()]).is_ok());
    }

    proptest! {
        #[test]
        fn prop_generated_specs_validate(spec in arb_column_spec(vec!["Id".into(), "Amount".into()])) {
            prop_assert!(spec.validate().is_ok(), "{:?}", spec);
        }

        #[test]
        fn prop_existing_columns_are_ordered(columns in arb_existing_columns()) {
            for (i, column) in columns.iter().enumerate() {
                prop_assert_eq!(column.ordinal_position, i as i32 + 1);
            }
            prop_assert!(columns.iter().filter(|c| c.identity.is_some()).count() <= 1);
        }
    }
}
