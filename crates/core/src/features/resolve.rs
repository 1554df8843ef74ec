//! Finding the declaration a member reference points at.

use crate::index::ProjectIndex;
use crate::model::{Class, Field, Method};
use crate::project::FileId;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// A member together with the class and file declaring it.
#[derive(Debug, Clone)]
pub struct Declaration<T> {
    pub file: FileId,
    pub class: Arc<Class>,
    pub member: T,
}

/// `owner` followed by its ancestors, nearest first.
async fn lookup_order(index: &ProjectIndex, owner: &str, cancel: &CancellationToken) -> Vec<String> {
    let mut order = vec![owner.to_string()];
    order.extend(index.find_superclass_chain(owner, cancel).await);
    order
}

/// Declarations of `field` in the nearest class, starting at `owner`, that has any.
pub async fn resolve_field(
    index: &ProjectIndex,
    owner: &str,
    field: &Field,
    cancel: &CancellationToken,
) -> Vec<Declaration<Field>> {
    for identifier in lookup_order(index, owner, cancel).await {
        let mut found = Vec::new();
        for (file, class) in index.find_classes(&identifier, cancel).await {
            for member in class.find_fields(field) {
                found.push(Declaration {
                    file: file.clone(),
                    class: class.clone(),
                    member: member.clone(),
                });
            }
        }
        if !found.is_empty() {
            return found;
        }
    }
    Vec::new()
}

/// Declarations of `method` in the nearest class, starting at `owner`, that has any.
/// Constructors are only looked up in `owner`.
pub async fn resolve_method(
    index: &ProjectIndex,
    owner: &str,
    method: &Method,
    cancel: &CancellationToken,
) -> Vec<Declaration<Method>> {
    let order = if method.is_constructor() {
        vec![owner.to_string()]
    } else {
        lookup_order(index, owner, cancel).await
    };
    for identifier in order {
        let mut found = Vec::new();
        for (file, class) in index.find_classes(&identifier, cancel).await {
            for member in class.find_methods(method) {
                found.push(Declaration {
                    file: file.clone(),
                    class: class.clone(),
                    member: member.clone(),
                });
            }
        }
        if !found.is_empty() {
            return found;
        }
    }
    Vec::new()
}
