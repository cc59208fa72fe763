// SPDX-FileCopyrightText: 2026 Chronofact Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Collection bootstrap: declares the three Chronofact collections and
//! creates them idempotently at startup.

use chronofact_core::error::ChronofactError;
use chronofact_core::traits::VectorStore;
use chronofact_core::types::{
    CLIP_VECTOR_DIM, COLLECTION_FACTS, COLLECTION_MEMORY, COLLECTION_POSTS, IMAGE_VECTOR,
    MULTIMODAL_VECTOR, SPARSE_TEXT_VECTOR, TEXT_VECTOR, TEXT_VECTOR_DIM,
};
use chronofact_core::vector::{
    CollectionSpec, PayloadFieldKind, PayloadIndexSpec, SparseVectorSpec, VectorSpec,
};
use tracing::info;

fn index(field: &str, kind: PayloadFieldKind) -> PayloadIndexSpec {
    PayloadIndexSpec {
        field: field.to_string(),
        kind,
    }
}

/// Layout of the posts collection: dense text vector, the two CLIP vectors,
/// and a sparse keyword vector derived from the post text.
pub fn posts_collection() -> CollectionSpec {
    CollectionSpec {
        name: COLLECTION_POSTS.to_string(),
        vectors: vec![
            VectorSpec {
                name: TEXT_VECTOR.to_string(),
                dimensions: TEXT_VECTOR_DIM,
            },
            VectorSpec {
                name: IMAGE_VECTOR.to_string(),
                dimensions: CLIP_VECTOR_DIM,
            },
            VectorSpec {
                name: MULTIMODAL_VECTOR.to_string(),
                dimensions: CLIP_VECTOR_DIM,
            },
        ],
        sparse: vec![SparseVectorSpec {
            name: SPARSE_TEXT_VECTOR.to_string(),
            source_field: "text".to_string(),
        }],
        payload_indexes: vec![
            index("credibility_score", PayloadFieldKind::Float),
            index("location", PayloadFieldKind::Keyword),
            index("timestamp", PayloadFieldKind::Datetime),
            index("is_verified", PayloadFieldKind::Bool),
        ],
    }
}

/// Layout of the verified-facts collection.
pub fn facts_collection() -> CollectionSpec {
    CollectionSpec {
        name: COLLECTION_FACTS.to_string(),
        vectors: vec![VectorSpec {
            name: TEXT_VECTOR.to_string(),
            dimensions: TEXT_VECTOR_DIM,
        }],
        sparse: vec![],
        payload_indexes: vec![
            index("verification_status", PayloadFieldKind::Keyword),
            index("verified_at", PayloadFieldKind::Datetime),
        ],
    }
}

/// Layout of the session-memory collection.
pub fn memory_collection() -> CollectionSpec {
    CollectionSpec {
        name: COLLECTION_MEMORY.to_string(),
        vectors: vec![VectorSpec {
            name: TEXT_VECTOR.to_string(),
            dimensions: TEXT_VECTOR_DIM,
        }],
        sparse: vec![],
        payload_indexes: vec![
            index("session_id", PayloadFieldKind::Keyword),
            index("relevance_score", PayloadFieldKind::Float),
            index("memory_type", PayloadFieldKind::Keyword),
            index("last_accessed", PayloadFieldKind::Datetime),
        ],
    }
}

/// Create all three collections if they do not exist yet.
pub async fn ensure_collections(store: &dyn VectorStore) -> Result<(), ChronofactError> {
    for spec in [posts_collection(), facts_collection(), memory_collection()] {
        store.ensure_collection(&spec).await?;
        info!(collection = spec.name.as_str(), "collection ready");
    }
    Ok(())
}
