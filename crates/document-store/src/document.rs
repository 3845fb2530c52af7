use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::DocumentId;

/// A typed entity persisted as one JSON document in a named collection.
pub trait Document: Serialize + DeserializeOwned + Send + Sync {
    /// Name of the collection the document lives in.
    const COLLECTION: &'static str;

    /// The document's primary key.
    fn id(&self) -> DocumentId;
}
