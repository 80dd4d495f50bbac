//! Identifier generation for new instances

use uuid::Uuid;

/// Produces identifiers for instances saved without one
pub trait IdGenerator: Send + Sync {
    fn generate(&self) -> String;
}

/// Random UUIDv4 identifiers in simple (dashless) form
#[derive(Debug, Clone, Copy, Default)]
pub struct UuidGenerator;

impl IdGenerator for UuidGenerator {
    fn generate(&self) -> String {
        Uuid::new_v4().simple().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uuid_ids_are_unique() {
        let generator = UuidGenerator;
        let a = generator.generate();
        let b = generator.generate();

        assert_eq!(a.len(), 32);
        assert_ne!(a, b);
    }
}
