use std::any::{type_name, TypeId};
use std::fmt;

/// What a key aggregates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyShape {
    /// A single instance of the type
    Single,
    /// Ordered contributions collected with `multibind`
    Sequence,
    /// Named contributions collected with `multibind_map`
    Mapping,
}

/// Identity of a requested dependency: type descriptor plus optional annotation
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BindingKey {
    type_id: TypeId,
    type_name: &'static str,
    shape: KeyShape,
    annotation: Option<String>,
}

impl BindingKey {
    /// Key for a single instance of `T`
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self::with_shape::<T>(KeyShape::Single)
    }

    /// Key for a single instance of `T` distinguished by an annotation
    pub fn annotated<T: ?Sized + 'static>(annotation: impl Into<String>) -> Self {
        Self::of::<T>().with_annotation(annotation)
    }

    /// Key for the multibound sequence of `T`
    pub fn sequence<T: ?Sized + 'static>() -> Self {
        Self::with_shape::<T>(KeyShape::Sequence)
    }

    /// Key for the multibound mapping of `T`
    pub fn mapping<T: ?Sized + 'static>() -> Self {
        Self::with_shape::<T>(KeyShape::Mapping)
    }

    fn with_shape<T: ?Sized + 'static>(shape: KeyShape) -> Self {
        Self {
            type_id: TypeId::of::<T>(),
            type_name: type_name::<T>(),
            shape,
            annotation: None,
        }
    }

    pub fn with_annotation(mut self, annotation: impl Into<String>) -> Self {
        self.annotation = Some(annotation.into());
        self
    }

    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub fn shape(&self) -> KeyShape {
        self.shape
    }

    pub fn annotation(&self) -> Option<&str> {
        self.annotation.as_deref()
    }

    /// Check if this key names an aggregate built by multibinding
    pub fn is_aggregate(&self) -> bool {
        self.shape != KeyShape::Single
    }

    /// Check if this is the plain key of `T`
    pub fn is<T: ?Sized + 'static>(&self) -> bool {
        self.type_id == TypeId::of::<T>() && self.shape == KeyShape::Single && self.annotation.is_none()
    }
}

impl fmt::Display for BindingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.shape {
            KeyShape::Single => write!(f, "{}", self.type_name)?,
            KeyShape::Sequence => write!(f, "[{}]", self.type_name)?,
            KeyShape::Mapping => write!(f, "{{str: {}}}", self.type_name)?,
        }
        if let Some(annotation) = &self.annotation {
            write!(f, "@{}", annotation)?;
        }
        Ok(())
    }
}
