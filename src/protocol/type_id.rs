// https://dev.mysql.com/doc/dev/mysql-server/8.0.12/binary__log__types_8h.html
// https://mariadb.com/kb/en/library/resultset/#field-types
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TypeId(pub u8);

impl TypeId {
    pub const DECIMAL: TypeId = TypeId(0);
    pub const TINY_INT: TypeId = TypeId(1);
    pub const SMALL_INT: TypeId = TypeId(2);
    pub const INT: TypeId = TypeId(3);
    pub const FLOAT: TypeId = TypeId(4);
    pub const DOUBLE: TypeId = TypeId(5);
    pub const NULL: TypeId = TypeId(6);
    pub const TIMESTAMP: TypeId = TypeId(7);
    pub const BIG_INT: TypeId = TypeId(8);
    pub const MEDIUM_INT: TypeId = TypeId(9);
    pub const DATE: TypeId = TypeId(10);
    pub const TIME: TypeId = TypeId(11);
    pub const DATETIME: TypeId = TypeId(12);
    pub const YEAR: TypeId = TypeId(13);
    pub const BIT: TypeId = TypeId(16);
    pub const JSON: TypeId = TypeId(245);
    pub const NEWDECIMAL: TypeId = TypeId(246);
    pub const ENUM: TypeId = TypeId(247);
    pub const GEOMETRY: TypeId = TypeId(255 - 1); // 254 clash, see CHAR below
    pub const TINY_BLOB: TypeId = TypeId(249);
    pub const MEDIUM_BLOB: TypeId = TypeId(250);
    pub const LONG_BLOB: TypeId = TypeId(251);

    // String: CHAR, VARCHAR, TEXT
    // Bytes: BINARY, VARBINARY, BLOB
    pub const CHAR: TypeId = TypeId(254); // or BINARY
    pub const VAR_CHAR: TypeId = TypeId(253); // or VAR_BINARY
    pub const TEXT: TypeId = TypeId(252); // or BLOB

    pub fn is_fixed_width_binary(self) -> Option<usize> {
        match self {
            TypeId::TINY_INT => Some(1),
            TypeId::SMALL_INT | TypeId::YEAR => Some(2),
            TypeId::INT | TypeId::MEDIUM_INT | TypeId::FLOAT => Some(4),
            TypeId::BIG_INT | TypeId::DOUBLE => Some(8),
            _ => None,
        }
    }
}

impl Default for TypeId {
    fn default() -> TypeId {
        TypeId::NULL
    }
}
