use std::collections::HashMap;
use std::fmt;

use crate::error::{OrcError, Result};
use crate::proto::{Type, TypeKind};

/// Largest decimal precision an i128 unscaled value can hold.
pub const MAX_DECIMAL_PRECISION: u32 = 38;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataType {
    Boolean,
    Byte,
    Short,
    Int,
    Long,
    Float,
    Double,
    String,
    Varchar { max_length: u32 },
    Char { max_length: u32 },
    Binary,
    Decimal { precision: u32, scale: u32 },
    Date,
    Timestamp,
}

impl DataType {
    pub fn kind(&self) -> TypeKind {
        match self {
            DataType::Boolean => TypeKind::Boolean,
            DataType::Byte => TypeKind::Byte,
            DataType::Short => TypeKind::Short,
            DataType::Int => TypeKind::Int,
            DataType::Long => TypeKind::Long,
            DataType::Float => TypeKind::Float,
            DataType::Double => TypeKind::Double,
            DataType::String => TypeKind::String,
            DataType::Varchar { .. } => TypeKind::Varchar,
            DataType::Char { .. } => TypeKind::Char,
            DataType::Binary => TypeKind::Binary,
            DataType::Decimal { .. } => TypeKind::Decimal,
            DataType::Date => TypeKind::Date,
            DataType::Timestamp => TypeKind::Timestamp,
        }
    }

    /// Integer-family columns share the DATA-only signed RLE layout.
    pub fn is_integer(&self) -> bool {
        matches!(
            self,
            DataType::Short | DataType::Int | DataType::Long | DataType::Date
        )
    }

    pub fn is_string(&self) -> bool {
        matches!(
            self,
            DataType::String | DataType::Varchar { .. } | DataType::Char { .. }
        )
    }

    fn from_type(ty: &Type) -> Result<Self> {
        Ok(match ty.kind {
            TypeKind::Boolean => DataType::Boolean,
            TypeKind::Byte => DataType::Byte,
            TypeKind::Short => DataType::Short,
            TypeKind::Int => DataType::Int,
            TypeKind::Long => DataType::Long,
            TypeKind::Float => DataType::Float,
            TypeKind::Double => DataType::Double,
            TypeKind::String => DataType::String,
            TypeKind::Varchar => DataType::Varchar {
                max_length: ty.maximum_length.unwrap_or(u32::MAX),
            },
            TypeKind::Char => DataType::Char {
                max_length: ty.maximum_length.unwrap_or(1),
            },
            TypeKind::Binary => DataType::Binary,
            TypeKind::Decimal => {
                let precision = ty.precision.unwrap_or(MAX_DECIMAL_PRECISION);
                let scale = ty.scale.unwrap_or(10);
                if precision > MAX_DECIMAL_PRECISION || scale > precision {
                    return Err(OrcError::UnsupportedType(format!(
                        "decimal({}, {})",
                        precision, scale
                    )));
                }
                DataType::Decimal { precision, scale }
            }
            TypeKind::Date => DataType::Date,
            TypeKind::Timestamp => DataType::Timestamp,
            TypeKind::List | TypeKind::Map | TypeKind::Struct | TypeKind::Union => {
                return Err(OrcError::Unsupported(format!(
                    "nested column type {:?}",
                    ty.kind
                )))
            }
        })
    }

    fn to_type(self) -> Type {
        let mut ty = Type::new(self.kind());
        match self {
            DataType::Varchar { max_length } | DataType::Char { max_length } => {
                ty.maximum_length = Some(max_length);
            }
            DataType::Decimal { precision, scale } => {
                ty.precision = Some(precision);
                ty.scale = Some(scale);
            }
            _ => {}
        }
        ty
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataType::Boolean => write!(f, "boolean"),
            DataType::Byte => write!(f, "tinyint"),
            DataType::Short => write!(f, "smallint"),
            DataType::Int => write!(f, "int"),
            DataType::Long => write!(f, "bigint"),
            DataType::Float => write!(f, "float"),
            DataType::Double => write!(f, "double"),
            DataType::String => write!(f, "string"),
            DataType::Varchar { max_length } => write!(f, "varchar({})", max_length),
            DataType::Char { max_length } => write!(f, "char({})", max_length),
            DataType::Binary => write!(f, "binary"),
            DataType::Decimal { precision, scale } => {
                write!(f, "decimal({},{})", precision, scale)
            }
            DataType::Date => write!(f, "date"),
            DataType::Timestamp => write!(f, "timestamp"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: String,
    pub data_type: DataType,
}

impl Column {
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            data_type,
        }
    }
}

/// The root struct of an ORC file. Column `i` of the schema is ORC column
/// id `i + 1`; id 0 is the struct itself.
#[derive(Debug, Clone)]
pub struct Schema {
    pub columns: Vec<Column>,
    column_index: HashMap<String, usize>,
}

impl PartialEq for Schema {
    fn eq(&self, other: &Self) -> bool {
        self.columns == other.columns
    }
}

impl Schema {
    pub fn new(columns: Vec<Column>) -> Self {
        let column_index = columns
            .iter()
            .enumerate()
            .map(|(i, c)| (c.name.to_lowercase(), i))
            .collect();
        Self {
            columns,
            column_index,
        }
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.column_index.get(&name.to_lowercase()).copied()
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    /// Resolves column names to schema positions, all columns when `None`.
    pub fn resolve(&self, names: Option<&[String]>) -> Result<Vec<usize>> {
        match names {
            None => Ok((0..self.columns.len()).collect()),
            Some(names) => names
                .iter()
                .map(|name| {
                    self.column_index(name)
                        .ok_or_else(|| OrcError::ColumnNotFound(name.clone()))
                })
                .collect(),
        }
    }

    /// Builds the schema from a footer type list.
    pub fn from_types(types: &[Type]) -> Result<Self> {
        let root = types
            .first()
            .ok_or_else(|| OrcError::InvalidFormat("footer has no types".into()))?;
        if root.kind != TypeKind::Struct {
            return Err(OrcError::InvalidFormat(format!(
                "root type must be a struct, found {:?}",
                root.kind
            )));
        }
        if root.field_names.len() != root.subtypes.len() {
            return Err(OrcError::InvalidFormat(format!(
                "root struct has {} subtypes but {} field names",
                root.subtypes.len(),
                root.field_names.len()
            )));
        }
        let mut columns = Vec::with_capacity(root.subtypes.len());
        for (i, (&id, name)) in root.subtypes.iter().zip(&root.field_names).enumerate() {
            if id as usize != i + 1 {
                return Err(OrcError::Unsupported(format!(
                    "column '{}' has type id {}; only flat structs are supported",
                    name, id
                )));
            }
            let ty = types.get(id as usize).ok_or_else(|| {
                OrcError::InvalidFormat(format!("type id {} out of range", id))
            })?;
            columns.push(Column::new(name.clone(), DataType::from_type(ty)?));
        }
        Ok(Schema::new(columns))
    }

    pub fn to_types(&self) -> Vec<Type> {
        let mut root = Type::new(TypeKind::Struct);
        root.subtypes = (1..=self.columns.len() as u32).collect();
        root.field_names = self.columns.iter().map(|c| c.name.clone()).collect();
        let mut types = vec![root];
        types.extend(self.columns.iter().map(|c| c.data_type.to_type()));
        types
    }
}

impl fmt::Display for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "struct<")?;
        for (i, col) in self.columns.iter().enumerate() {
            if i > 0 {
                write!(f, ",")?;
            }
            write!(f, "{}:{}", col.name, col.data_type)?;
        }
        write!(f, ">")
    }
}
