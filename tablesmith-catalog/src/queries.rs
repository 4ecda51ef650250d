//! Catalog query text.
//!
//! `@P1` is always the schema name and `@P2` the table name.

macro_rules! target_object_id {
    () => {
        "OBJECT_ID(QUOTENAME(@P1) + N'.' + QUOTENAME(@P2))"
    };
}

macro_rules! foreign_key_select {
    () => {
        "SELECT fk.name AS constraint_name, \
         OBJECT_SCHEMA_NAME(fk.parent_object_id) AS parent_schema, \
         OBJECT_NAME(fk.parent_object_id) AS parent_table, \
         pc.name AS parent_column, \
         OBJECT_SCHEMA_NAME(fk.referenced_object_id) AS referenced_schema, \
         OBJECT_NAME(fk.referenced_object_id) AS referenced_table, \
         rc.name AS referenced_column, \
         fk.delete_referential_action_desc AS on_delete, \
         fk.update_referential_action_desc AS on_update \
         FROM sys.foreign_keys AS fk \
         JOIN sys.foreign_key_columns AS fkc ON fkc.constraint_object_id = fk.object_id \
         JOIN sys.columns AS pc ON pc.object_id = fkc.parent_object_id AND pc.column_id = fkc.parent_column_id \
         JOIN sys.columns AS rc ON rc.object_id = fkc.referenced_object_id AND rc.column_id = fkc.referenced_column_id "
    };
}

pub const LIST_SCHEMAS: &str = "SELECT s.name AS schema_name FROM sys.schemas AS s ORDER BY s.name";

/// `@P1` is the schema name.
pub const LIST_TABLES: &str = "SELECT t.name AS table_name \
     FROM sys.tables AS t \
     JOIN sys.schemas AS s ON t.schema_id = s.schema_id \
     WHERE s.name = @P1 \
     ORDER BY t.name";

pub const TABLE_EXISTS: &str = concat!(
    "SELECT t.object_id FROM sys.tables AS t WHERE t.object_id = ",
    target_object_id!()
);

pub const LIST_COLUMNS: &str = concat!(
    "SELECT c.name AS column_name, tp.name AS type_name, \
     CAST(c.max_length AS INT) AS max_length, \
     CAST(c.precision AS INT) AS precision, \
     CAST(c.scale AS INT) AS scale, \
     c.is_nullable, c.column_id AS ordinal_position, \
     dc.definition AS default_definition, dc.name AS default_constraint, \
     CAST(ic.seed_value AS NVARCHAR(40)) AS identity_seed, \
     CAST(ic.increment_value AS NVARCHAR(40)) AS identity_increment, \
     cc.definition AS computed_definition, cc.is_persisted \
     FROM sys.columns AS c \
     JOIN sys.types AS tp ON c.user_type_id = tp.user_type_id \
     LEFT JOIN sys.default_constraints AS dc ON c.default_object_id = dc.object_id \
     LEFT JOIN sys.identity_columns AS ic ON c.object_id = ic.object_id AND c.column_id = ic.column_id \
     LEFT JOIN sys.computed_columns AS cc ON c.object_id = cc.object_id AND c.column_id = cc.column_id \
     WHERE c.object_id = ",
    target_object_id!(),
    " ORDER BY c.column_id"
);

pub const PRIMARY_KEY: &str = concat!(
    "SELECT kc.name AS constraint_name, \
     CAST(CASE WHEN i.type = 1 THEN 1 ELSE 0 END AS BIT) AS is_clustered, \
     c.name AS column_name, ic.is_descending_key \
     FROM sys.key_constraints AS kc \
     JOIN sys.indexes AS i ON i.object_id = kc.parent_object_id AND i.index_id = kc.unique_index_id \
     JOIN sys.index_columns AS ic ON ic.object_id = i.object_id AND ic.index_id = i.index_id \
     JOIN sys.columns AS c ON c.object_id = ic.object_id AND c.column_id = ic.column_id \
     WHERE kc.type = 'PK' AND kc.parent_object_id = ",
    target_object_id!(),
    " ORDER BY ic.key_ordinal"
);

/// One row per index column; key columns first in key order, then included
/// columns. Columnstore members are listed as included columns; an index
/// without listed columns yields one row with a null column.
pub const INDEXES: &str = concat!(
    "SELECT i.name AS index_name, CAST(i.type AS INT) AS index_type, \
     i.is_unique, i.is_unique_constraint, \
     CAST(CASE WHEN i.type = 1 THEN 1 ELSE 0 END AS BIT) AS is_clustered, \
     i.filter_definition, c.name AS column_name, \
     ic.is_descending_key, ic.is_included_column \
     FROM sys.indexes AS i \
     LEFT JOIN sys.index_columns AS ic ON ic.object_id = i.object_id AND ic.index_id = i.index_id \
     LEFT JOIN sys.columns AS c ON c.object_id = ic.object_id AND c.column_id = ic.column_id \
     WHERE i.is_primary_key = 0 AND i.is_hypothetical = 0 AND i.type IN (1, 2, 5, 6) \
     AND i.object_id = ",
    target_object_id!(),
    " ORDER BY i.name, ic.is_included_column, ic.key_ordinal, ic.index_column_id"
);

/// Indexes whose definition a rebuild cannot reproduce: XML, spatial and
/// hash indexes.
pub const UNSUPPORTED_INDEXES: &str = concat!(
    "SELECT i.name AS index_name, i.type_desc \
     FROM sys.indexes AS i \
     WHERE i.type NOT IN (0, 1, 2, 5, 6) AND i.is_hypothetical = 0 AND i.object_id = ",
    target_object_id!(),
    " ORDER BY i.name"
);

pub const CHECK_CONSTRAINTS: &str = concat!(
    "SELECT cc.name AS constraint_name, cc.definition \
     FROM sys.check_constraints AS cc \
     WHERE cc.parent_object_id = ",
    target_object_id!(),
    " ORDER BY cc.name"
);

/// Foreign keys declared on the target table, self-references included.
pub const OUTBOUND_FOREIGN_KEYS: &str = concat!(
    foreign_key_select!(),
    "WHERE fk.parent_object_id = ",
    target_object_id!(),
    " ORDER BY fk.name, fkc.constraint_column_id"
);

/// Foreign keys on other tables that reference the target table.
pub const INBOUND_FOREIGN_KEYS: &str = concat!(
    foreign_key_select!(),
    "WHERE fk.parent_object_id <> fk.referenced_object_id AND fk.referenced_object_id = ",
    target_object_id!(),
    " ORDER BY parent_schema, parent_table, fk.name, fkc.constraint_column_id"
);

/// Object-level grants and denies; column-level entries carry the column.
pub const PERMISSIONS: &str = concat!(
    "SELECT perm.permission_name, perm.state_desc, prin.name AS grantee, col.name AS column_name \
     FROM sys.database_permissions AS perm \
     JOIN sys.database_principals AS prin ON perm.grantee_principal_id = prin.principal_id \
     LEFT JOIN sys.columns AS col ON col.object_id = perm.major_id AND col.column_id = perm.minor_id \
     WHERE perm.class = 1 AND perm.major_id = ",
    target_object_id!(),
    " ORDER BY prin.name, perm.permission_name, perm.state_desc, perm.minor_id"
);

/// `@P3` is the column name.
pub const DEFAULT_CONSTRAINT: &str = concat!(
    "SELECT dc.name AS constraint_name \
     FROM sys.default_constraints AS dc \
     JOIN sys.columns AS c ON c.object_id = dc.parent_object_id AND c.column_id = dc.parent_column_id \
     WHERE c.name = @P3 AND dc.parent_object_id = ",
    target_object_id!()
);
