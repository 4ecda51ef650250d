//! Type text synthesis from raw catalog values.

/// Render a column type from `sys.columns` / `sys.types` values.
///
/// `max_length` is the raw storage length in bytes (`-1` for MAX), so
/// unicode character types report half of it.
pub fn type_text(type_name: &str, max_length: i32, precision: i32, scale: i32) -> String {
    let lowered = type_name.to_ascii_lowercase();
    match lowered.as_str() {
        "varchar" | "char" | "varbinary" | "binary" => {
            format!("{}({})", lowered, length_text(max_length, 1))
        }
        "nvarchar" | "nchar" => format!("{}({})", lowered, length_text(max_length, 2)),
        "decimal" | "numeric" => format!("{}({},{})", lowered, precision, scale),
        "datetime2" | "datetimeoffset" | "time" => format!("{}({})", lowered, scale),
        _ => type_name.to_string(),
    }
}

fn length_text(max_length: i32, bytes_per_char: i32) -> String {
    if max_length == -1 {
        "MAX".to_string()
    } else {
        (max_length / bytes_per_char).to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_character_lengths() {
        assert_eq!(type_text("varchar", 50, 0, 0), "varchar(50)");
        assert_eq!(type_text("char", 3, 0, 0), "char(3)");
        assert_eq!(type_text("nvarchar", 100, 0, 0), "nvarchar(50)");
        assert_eq!(type_text("nchar", 20, 0, 0), "nchar(10)");
        assert_eq!(type_text("varchar", -1, 0, 0), "varchar(MAX)");
        assert_eq!(type_text("nvarchar", -1, 0, 0), "nvarchar(MAX)");
    }

    #[test]
    fn test_binary_keeps_length() {
        assert_eq!(type_text("varbinary", 16, 0, 0), "varbinary(16)");
        assert_eq!(type_text("binary", 8, 0, 0), "binary(8)");
        assert_eq!(type_text("varbinary", -1, 0, 0), "varbinary(MAX)");
    }

    #[test]
    fn test_precision_and_scale() {
        assert_eq!(type_text("decimal", 9, 10, 2), "decimal(10,2)");
        assert_eq!(type_text("NUMERIC", 9, 18, 0), "numeric(18,0)");
        assert_eq!(type_text("datetime2", 8, 27, 7), "datetime2(7)");
        assert_eq!(type_text("time", 5, 16, 3), "time(3)");
        assert_eq!(type_text("datetimeoffset", 10, 34, 7), "datetimeoffset(7)");
    }

    #[test]
    fn test_plain_types() {
        assert_eq!(type_text("int", 4, 10, 0), "int");
        assert_eq!(type_text("datetime", 8, 23, 3), "datetime");
        assert_eq!(type_text("float", 8, 53, 0), "float");
        assert_eq!(type_text("uniqueidentifier", 16, 0, 0), "uniqueidentifier");
    }
}
