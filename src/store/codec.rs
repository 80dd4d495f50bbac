//! Instance payload codec
//!
//! Converts workflow instances to raw BSON documents and back, and decides
//! whether the `Variables` payload stays inline or moves to the blob store.

use bson::Document;

use crate::db::schemas::{WorkflowInstance, ID_FIELD, VARIABLES_FIELD};
use crate::types::{Result, StoreError};

/// Payloads larger than this many bytes are offloaded
pub const DEFAULT_OFFLOAD_THRESHOLD: usize = 10_240;

/// Prefix of blob reference strings stored in place of offloaded content
pub const BLOB_KEY_PREFIX: &str = "GRIDFS/";

/// Blob key owned by an instance
pub fn blob_key(id: &str) -> String {
    format!("{}{}", BLOB_KEY_PREFIX, id)
}

/// Whether `value` is the blob reference owned by instance `id`. Any other
/// string, including a reference to another instance's key, is content.
pub fn is_blob_reference(id: &str, value: &str) -> bool {
    !id.is_empty() && value.strip_prefix(BLOB_KEY_PREFIX) == Some(id)
}

/// Blob key referenced by a raw document, if its `Variables` field holds the
/// key derived from the document's own `_id`
pub fn document_blob_reference(document: &Document) -> Option<String> {
    let id = document.get_str(ID_FIELD).ok()?;
    let value = document.get_str(VARIABLES_FIELD).ok()?;
    is_blob_reference(id, value).then(|| blob_key(id))
}

/// Content the caller writes to the blob store alongside the accompanying
/// document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Offload {
    pub key: String,
    pub content: String,
}

/// Result of encoding one instance
#[derive(Debug, Clone)]
pub struct EncodedInstance {
    pub id: String,
    pub document: Document,
    pub offload: Option<Offload>,
}

/// Encodes and decodes instance documents
#[derive(Debug, Clone, Copy)]
pub struct InstanceCodec {
    threshold: usize,
}

impl Default for InstanceCodec {
    fn default() -> Self {
        Self::new(DEFAULT_OFFLOAD_THRESHOLD)
    }
}

impl InstanceCodec {
    pub fn new(threshold: usize) -> Self {
        Self { threshold }
    }

    pub fn threshold(&self) -> usize {
        self.threshold
    }

    /// Serialize an instance, offloading `Variables` when it exceeds the
    /// threshold. The instance must already carry its id.
    ///
    /// Content that spells the instance's own blob key is offloaded too,
    /// since stored inline it would read back as a reference.
    pub fn encode(&self, instance: &WorkflowInstance) -> Result<EncodedInstance> {
        let mut document = bson::to_document(instance)?;

        let offload = if instance.variables.len() > self.threshold
            || is_blob_reference(&instance.id, &instance.variables)
        {
            if instance.id.is_empty() {
                return Err(StoreError::Internal(
                    "cannot offload variables of an instance without id".into(),
                ));
            }

            let key = blob_key(&instance.id);
            document.insert(VARIABLES_FIELD, key.as_str());

            Some(Offload {
                key,
                content: instance.variables.clone(),
            })
        } else {
            None
        };

        Ok(EncodedInstance {
            id: instance.id.clone(),
            document,
            offload,
        })
    }

    /// Deserialize a raw document whose `Variables` already holds literal
    /// content
    pub fn decode(&self, document: Document) -> Result<WorkflowInstance> {
        Ok(bson::from_document(document)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;

    #[test]
    fn test_small_payload_stays_inline() {
        let codec = InstanceCodec::default();
        let instance = WorkflowInstance::new("def").with_id("i-1").with_variables("{}");

        let encoded = codec.encode(&instance).unwrap();
        assert!(encoded.offload.is_none());
        assert_eq!(encoded.document.get_str(VARIABLES_FIELD).unwrap(), "{}");
    }

    #[test]
    fn test_threshold_boundary() {
        let codec = InstanceCodec::default();

        let at_limit = WorkflowInstance::new("def")
            .with_id("i-1")
            .with_variables("x".repeat(DEFAULT_OFFLOAD_THRESHOLD));
        assert!(codec.encode(&at_limit).unwrap().offload.is_none());

        let over_limit = at_limit.with_variables("x".repeat(DEFAULT_OFFLOAD_THRESHOLD + 1));
        let encoded = codec.encode(&over_limit).unwrap();

        let offload = encoded.offload.unwrap();
        assert_eq!(offload.key, "GRIDFS/i-1");
        assert_eq!(offload.content.len(), DEFAULT_OFFLOAD_THRESHOLD + 1);
        assert_eq!(encoded.document.get_str(VARIABLES_FIELD).unwrap(), "GRIDFS/i-1");
    }

    #[test]
    fn test_threshold_counts_bytes() {
        let codec = InstanceCodec::new(8);
        // Four characters, ten bytes
        let instance = WorkflowInstance::new("def").with_id("i-1").with_variables("日本語!");
        assert!(codec.encode(&instance).unwrap().offload.is_some());
    }

    #[test]
    fn test_offload_requires_id() {
        let codec = InstanceCodec::new(1);
        let instance = WorkflowInstance::new("def").with_variables("{\"a\":1}");
        assert!(matches!(codec.encode(&instance), Err(StoreError::Internal(_))));
    }

    #[test]
    fn test_decode_rejects_foreign_document() {
        let codec = InstanceCodec::default();
        let result = codec.decode(doc! { "_id": "x", "DefinitionId": 42 });
        assert!(matches!(result, Err(StoreError::Serialization(_))));
    }

    #[test]
    fn test_decode_inverts_inline_encode() {
        let codec = InstanceCodec::default();
        let mut instance = WorkflowInstance::new("def").with_id("i-9");
        instance.correlation_id = Some("corr".into());
        instance.output = Some(serde_json::json!({ "ok": true }));

        let encoded = codec.encode(&instance).unwrap();
        assert_eq!(codec.decode(encoded.document).unwrap(), instance);
    }

    #[test]
    fn test_blob_reference_requires_own_key() {
        assert!(is_blob_reference("abc", "GRIDFS/abc"));
        assert!(!is_blob_reference("abc", "GRIDFS/other"));
        assert!(!is_blob_reference("", "GRIDFS/"));
        assert!(!is_blob_reference("abc", "{\"Data\":{}}"));

        assert_eq!(
            document_blob_reference(&doc! { "_id": "i-1", "Variables": "GRIDFS/i-1" }),
            Some("GRIDFS/i-1".to_string())
        );
        assert_eq!(
            document_blob_reference(&doc! { "_id": "i-1", "Variables": "GRIDFS/i-2" }),
            None
        );
        assert_eq!(document_blob_reference(&doc! { "Variables": "GRIDFS/i-1" }), None);
        assert_eq!(document_blob_reference(&doc! { "_id": "i-1" }), None);
    }

    #[test]
    fn test_own_key_as_content_is_offloaded() {
        let codec = InstanceCodec::default();
        let instance = WorkflowInstance::new("def").with_id("i-1").with_variables("GRIDFS/i-1");

        let offload = codec.encode(&instance).unwrap().offload.unwrap();
        assert_eq!(offload.content, "GRIDFS/i-1");
    }
}
