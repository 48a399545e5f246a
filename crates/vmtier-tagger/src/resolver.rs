//! Tag resolver: find the tag whose name is the computed tier.

use tracing::debug;

use vmtier_core::{Label, TierName};
use vmtier_directory::{DirectoryResult, Session};

/// Identifiers of the tag to attach.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedTag {
    pub category_id: String,
    pub tag_id: String,
}

/// Look up the tag named `tier` in `category`.
///
/// `Ok(None)` means the category exists but has no tag for this tier yet;
/// taxonomies are maintained by hand and may lag the tier policy.
pub async fn resolve_tag(
    session: &Session,
    category: &str,
    tier: &TierName,
) -> DirectoryResult<Option<ResolvedTag>> {
    let labels = session.directory().tags_for_category(category).await?;
    let found = find_tag(&labels, tier);
    debug!(category, %tier, candidates = labels.len(), found = found.is_some(), "resolved tag");
    Ok(found)
}

/// First label whose name equals the tier name exactly.
pub fn find_tag(labels: &[Label], tier: &TierName) -> Option<ResolvedTag> {
    labels
        .iter()
        .find(|label| label.name == tier.as_str())
        .map(|label| ResolvedTag {
            category_id: label.category_id.clone(),
            tag_id: label.id.clone(),
        })
}
