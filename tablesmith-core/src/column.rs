//! Column specification model.
//!
//! A [`ColumnSpec`] is the immutable description of one pending column
//! addition. It is built from user input, validated once, and consumed by a
//! single mutation request.

use crate::error::ValidationError;
use crate::ident::unquote_string_literal;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

/// Longest identifier the server accepts (`sysname`).
pub const MAX_IDENTIFIER_LEN: usize = 128;

/// Zero-argument function calls that are emitted verbatim as column defaults.
pub const NILADIC_DEFAULTS: &[&str] = &[
    "GETDATE()",
    "GETUTCDATE()",
    "SYSDATETIME()",
    "SYSUTCDATETIME()",
    "SYSDATETIMEOFFSET()",
    "NEWID()",
    "NEWSEQUENTIALID()",
    "CURRENT_TIMESTAMP",
];

/// Return the canonical spelling of a niladic default, if `text` is one.
///
/// Matching ignores ASCII case and whitespace, so `getdate ( )` resolves to
/// `GETDATE()`.
pub fn niladic_canonical(text: &str) -> Option<&'static str> {
    let compact: String = text.chars().filter(|c| !c.is_whitespace()).collect();
    NILADIC_DEFAULTS
        .iter()
        .copied()
        .find(|candidate| candidate.eq_ignore_ascii_case(&compact))
}

static LENGTH_PARAM: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?i:max|[0-9]{1,4})$").expect("Invalid length regex"));
static PRECISION_SCALE_PARAM: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[0-9]{1,2}(\s*,\s*[0-9]{1,2})?$").expect("Invalid precision regex")
});
static SCALE_PARAM: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[0-9]$").expect("Invalid scale regex"));
static FLOAT_PARAM: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[0-9]{1,2}$").expect("Invalid float regex"));
static NUMERIC_LITERAL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[+-]?([0-9]+(\.[0-9]*)?|\.[0-9]+)([eE][+-]?[0-9]+)?$")
        .expect("Invalid numeric literal regex")
});

// ============================================================================
// TYPE FAMILIES
// ============================================================================

/// Family a base type belongs to. Drives default quoting and type-text rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TypeFamily {
    Integer,
    Exact,
    Money,
    Approximate,
    Boolean,
    Temporal,
    Character,
    UnicodeCharacter,
    Binary,
    Other,
}

impl TypeFamily {
    /// Numeric families take their default literal unquoted.
    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            TypeFamily::Integer | TypeFamily::Exact | TypeFamily::Money | TypeFamily::Approximate
        )
    }

    /// Whether a default literal is emitted verbatim rather than quoted.
    pub fn takes_bare_literal(&self) -> bool {
        self.is_numeric() || *self == TypeFamily::Boolean
    }
}

/// Shape of the parameter list a base type accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ParameterShape {
    None,
    Length,
    PrecisionScale,
    Scale,
    Precision,
}

// ============================================================================
// BASE TYPES
// ============================================================================

/// Supported column base types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BaseType {
    Int,
    BigInt,
    SmallInt,
    TinyInt,
    Bit,
    Decimal,
    Numeric,
    Money,
    SmallMoney,
    Float,
    Real,
    Date,
    DateTime,
    DateTime2,
    SmallDateTime,
    Time,
    DateTimeOffset,
    Char,
    VarChar,
    Text,
    NChar,
    NVarChar,
    NText,
    Binary,
    VarBinary,
    Image,
    UniqueIdentifier,
    Xml,
    SqlVariant,
}

impl BaseType {
    pub const ALL: [BaseType; 29] = [
        BaseType::Int,
        BaseType::BigInt,
        BaseType::SmallInt,
        BaseType::TinyInt,
        BaseType::Bit,
        BaseType::Decimal,
        BaseType::Numeric,
        BaseType::Money,
        BaseType::SmallMoney,
        BaseType::Float,
        BaseType::Real,
        BaseType::Date,
        BaseType::DateTime,
        BaseType::DateTime2,
        BaseType::SmallDateTime,
        BaseType::Time,
        BaseType::DateTimeOffset,
        BaseType::Char,
        BaseType::VarChar,
        BaseType::Text,
        BaseType::NChar,
        BaseType::NVarChar,
        BaseType::NText,
        BaseType::Binary,
        BaseType::VarBinary,
        BaseType::Image,
        BaseType::UniqueIdentifier,
        BaseType::Xml,
        BaseType::SqlVariant,
    ];

    /// Convert to the server's type name.
    pub fn as_db_str(&self) -> &'static str {
        match self {
            BaseType::Int => "int",
            BaseType::BigInt => "bigint",
            BaseType::SmallInt => "smallint",
            BaseType::TinyInt => "tinyint",
            BaseType::Bit => "bit",
            BaseType::Decimal => "decimal",
            BaseType::Numeric => "numeric",
            BaseType::Money => "money",
            BaseType::SmallMoney => "smallmoney",
            BaseType::Float => "float",
            BaseType::Real => "real",
            BaseType::Date => "date",
            BaseType::DateTime => "datetime",
            BaseType::DateTime2 => "datetime2",
            BaseType::SmallDateTime => "smalldatetime",
            BaseType::Time => "time",
            BaseType::DateTimeOffset => "datetimeoffset",
            BaseType::Char => "char",
            BaseType::VarChar => "varchar",
            BaseType::Text => "text",
            BaseType::NChar => "nchar",
            BaseType::NVarChar => "nvarchar",
            BaseType::NText => "ntext",
            BaseType::Binary => "binary",
            BaseType::VarBinary => "varbinary",
            BaseType::Image => "image",
            BaseType::UniqueIdentifier => "uniqueidentifier",
            BaseType::Xml => "xml",
            BaseType::SqlVariant => "sql_variant",
        }
    }

    /// Parse from the server's type name (case-insensitive).
    pub fn from_db_str(s: &str) -> Result<Self, BaseTypeParseError> {
        let lowered = s.trim().to_ascii_lowercase();
        Self::ALL
            .iter()
            .copied()
            .find(|t| t.as_db_str() == lowered)
            .ok_or_else(|| BaseTypeParseError(s.to_string()))
    }

    pub fn family(&self) -> TypeFamily {
        match self {
            BaseType::Int | BaseType::BigInt | BaseType::SmallInt | BaseType::TinyInt => {
                TypeFamily::Integer
            }
            BaseType::Decimal | BaseType::Numeric => TypeFamily::Exact,
            BaseType::Money | BaseType::SmallMoney => TypeFamily::Money,
            BaseType::Float | BaseType::Real => TypeFamily::Approximate,
            BaseType::Bit => TypeFamily::Boolean,
            BaseType::Date
            | BaseType::DateTime
            | BaseType::DateTime2
            | BaseType::SmallDateTime
            | BaseType::Time
            | BaseType::DateTimeOffset => TypeFamily::Temporal,
            BaseType::Char | BaseType::VarChar | BaseType::Text => TypeFamily::Character,
            BaseType::NChar | BaseType::NVarChar | BaseType::NText => TypeFamily::UnicodeCharacter,
            BaseType::Binary | BaseType::VarBinary | BaseType::Image => TypeFamily::Binary,
            BaseType::UniqueIdentifier | BaseType::Xml | BaseType::SqlVariant => TypeFamily::Other,
        }
    }

    fn parameter_shape(&self) -> ParameterShape {
        match self {
            BaseType::Char
            | BaseType::VarChar
            | BaseType::NChar
            | BaseType::NVarChar
            | BaseType::Binary
            | BaseType::VarBinary => ParameterShape::Length,
            BaseType::Decimal | BaseType::Numeric => ParameterShape::PrecisionScale,
            BaseType::DateTime2 | BaseType::Time | BaseType::DateTimeOffset => {
                ParameterShape::Scale
            }
            BaseType::Float => ParameterShape::Precision,
            _ => ParameterShape::None,
        }
    }
}

impl fmt::Display for BaseType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_db_str())
    }
}

impl FromStr for BaseType {
    type Err = BaseTypeParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_db_str(s)
    }
}

/// Error when parsing an unsupported base type name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BaseTypeParseError(pub String);

impl fmt::Display for BaseTypeParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Unsupported base type: {}", self.0)
    }
}

impl std::error::Error for BaseTypeParseError {}

// ============================================================================
// COLUMN TYPE
// ============================================================================

/// Base type plus its optional parameter text (`50`, `MAX`, `10,2`, `7`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnType {
    pub base: BaseType,
    #[serde(default)]
    pub parameters: Option<String>,
}

impl ColumnType {
    pub fn new(base: BaseType) -> Self {
        Self {
            base,
            parameters: None,
        }
    }

    pub fn with_parameters(base: BaseType, parameters: impl Into<String>) -> Self {
        let parameters: String = parameters.into();
        let trimmed = parameters.trim();
        Self {
            base,
            parameters: (!trimmed.is_empty()).then(|| trimmed.to_string()),
        }
    }

    /// Parse `varchar(50)`-style text.
    pub fn parse(text: &str) -> Result<Self, ValidationError> {
        let text = text.trim();
        let (base, parameters) = match text.find('(') {
            Some(open) => {
                let inner = text[open + 1..].strip_suffix(')').ok_or_else(|| {
                    ValidationError::InvalidValue {
                        field: "type".to_string(),
                        reason: format!("expected '{text}' to end with ')'"),
                    }
                })?;
                (&text[..open], Some(inner))
            }
            None => (text, None),
        };
        let base = BaseType::from_db_str(base).map_err(|e| ValidationError::InvalidValue {
            field: "type".to_string(),
            reason: e.to_string(),
        })?;
        let column_type = match parameters {
            Some(p) => Self::with_parameters(base, p),
            None => Self::new(base),
        };
        column_type.validate()?;
        Ok(column_type)
    }

    pub fn family(&self) -> TypeFamily {
        self.base.family()
    }

    /// Reject parameter text that does not fit the base type's shape.
    pub fn validate(&self) -> Result<(), ValidationError> {
        let Some(parameters) = self.parameters.as_deref() else {
            return Ok(());
        };
        let accepted = match self.base.parameter_shape() {
            ParameterShape::None => false,
            ParameterShape::Length => LENGTH_PARAM.is_match(parameters),
            ParameterShape::PrecisionScale => PRECISION_SCALE_PARAM.is_match(parameters),
            ParameterShape::Scale => SCALE_PARAM.is_match(parameters),
            ParameterShape::Precision => FLOAT_PARAM.is_match(parameters),
        };
        if accepted {
            Ok(())
        } else {
            Err(ValidationError::InvalidValue {
                field: "type_parameters".to_string(),
                reason: format!("'{}' is not valid for {}", parameters, self.base),
            })
        }
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.parameters {
            Some(p) => write!(f, "{}({})", self.base, p),
            None => write!(f, "{}", self.base),
        }
    }
}

// ============================================================================
// DEFAULT VALUES
// ============================================================================

/// A column default, tagged as either an expression or a literal.
///
/// Expressions are emitted verbatim. Literals are emitted bare for numeric
/// and boolean columns and as a unicode string literal otherwise.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "text", rename_all = "snake_case")]
pub enum DefaultValue {
    Expression(String),
    Literal(String),
}

impl DefaultValue {
    /// Classify raw user text: allow-listed niladic calls become expressions,
    /// everything else is a literal.
    pub fn infer(text: &str) -> Self {
        match niladic_canonical(text) {
            Some(canonical) => DefaultValue::Expression(canonical.to_string()),
            None => DefaultValue::Literal(text.trim().to_string()),
        }
    }

    pub fn text(&self) -> &str {
        match self {
            DefaultValue::Expression(t) | DefaultValue::Literal(t) => t,
        }
    }

    /// Check the value against the column type it will be bound to.
    pub fn validate_for(&self, column_type: &ColumnType) -> Result<(), ValidationError> {
        match self {
            DefaultValue::Expression(text) => {
                if text.trim().is_empty() {
                    return Err(ValidationError::InvalidValue {
                        field: "default".to_string(),
                        reason: "expression must not be empty".to_string(),
                    });
                }
                Ok(())
            }
            DefaultValue::Literal(text) => {
                let bare = unquote_string_literal(text).unwrap_or_else(|| text.clone());
                match column_type.family() {
                    TypeFamily::Boolean if bare != "0" && bare != "1" => {
                        Err(ValidationError::InvalidValue {
                            field: "default".to_string(),
                            reason: format!("'{text}' is not a bit literal (expected 0 or 1)"),
                        })
                    }
                    family if family.is_numeric() && !NUMERIC_LITERAL.is_match(&bare) => {
                        Err(ValidationError::InvalidValue {
                            field: "default".to_string(),
                            reason: format!(
                                "'{text}' is not a numeric literal for {}",
                                column_type.base
                            ),
                        })
                    }
                    _ => Ok(()),
                }
            }
        }
    }
}

// ============================================================================
// ANCHORS
// ============================================================================

/// Where a new column is inserted relative to the existing ones.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "position", content = "column", rename_all = "snake_case")]
pub enum Anchor {
    AtStart,
    After(String),
    #[default]
    AtEnd,
}

impl fmt::Display for Anchor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Anchor::AtStart => write!(f, "at start"),
            Anchor::After(column) => write!(f, "after {column}"),
            Anchor::AtEnd => write!(f, "at end"),
        }
    }
}

// ============================================================================
// COLUMN SPEC
// ============================================================================

/// Immutable description of one column to add.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnSpec {
    pub name: String,
    pub column_type: ColumnType,
    pub nullable: bool,
    #[serde(default)]
    pub default: Option<DefaultValue>,
    #[serde(default)]
    pub anchor: Anchor,
}

impl ColumnSpec {
    /// A nullable column appended at the end with no default.
    pub fn new(name: impl Into<String>, column_type: ColumnType) -> Self {
        Self {
            name: name.into(),
            column_type,
            nullable: true,
            default: None,
            anchor: Anchor::AtEnd,
        }
    }

    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    pub fn with_default(mut self, default: DefaultValue) -> Self {
        self.default = Some(default);
        self
    }

    pub fn with_anchor(mut self, anchor: Anchor) -> Self {
        self.anchor = anchor;
        self
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_column_name("name", &self.name)?;
        self.column_type.validate()?;
        if let Some(default) = &self.default {
            default.validate_for(&self.column_type)?;
        }
        if let Anchor::After(column) = &self.anchor {
            validate_column_name("anchor", column)?;
        }
        Ok(())
    }
}

/// Validate a whole add request: each spec on its own, then name uniqueness
/// (case-insensitive) across the request.
pub fn validate_specs(specs: &[ColumnSpec]) -> Result<(), ValidationError> {
    if specs.is_empty() {
        return Err(ValidationError::RequiredFieldMissing {
            field: "columns".to_string(),
        });
    }
    let mut seen = HashSet::new();
    for spec in specs {
        spec.validate()?;
        if !seen.insert(spec.name.trim().to_lowercase()) {
            return Err(ValidationError::DuplicateColumn {
                name: spec.name.clone(),
            });
        }
    }
    Ok(())
}

pub(crate) fn validate_column_name(field: &str, name: &str) -> Result<(), ValidationError> {
    if name.trim().is_empty() {
        return Err(ValidationError::RequiredFieldMissing {
            field: field.to_string(),
        });
    }
    if name.chars().count() > MAX_IDENTIFIER_LEN {
        return Err(ValidationError::InvalidValue {
            field: field.to_string(),
            reason: format!("longer than {MAX_IDENTIFIER_LEN} characters"),
        });
    }
    Ok(())
}

// ============================================================================
// COLUMN CHANGE (retype / nullability / default)
// ============================================================================

/// Target state for an in-place column modification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnChange {
    pub column_type: ColumnType,
    pub nullable: bool,
    #[serde(default)]
    pub default: Option<DefaultValue>,
}

impl ColumnChange {
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.column_type.validate()?;
        if let Some(default) = &self.default {
            default.validate_for(&self.column_type)?;
        }
        Ok(())
    }
}
