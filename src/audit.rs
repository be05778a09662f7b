use crate::db::models::AccessRecord;
use crate::db::repository::Repository;

/// Best-effort recorder of API accesses.
///
/// Thin by design: the adapter assembles an [`AccessRecord`] from request
/// metadata and this type delegates to the repository's fire-and-forget
/// audit write. A failing audit write never surfaces to the caller, so
/// recording can be dropped into any handler without changing its
/// outcome.
#[derive(Clone)]
pub struct AuditLogger {
    repo: Repository,
}

impl AuditLogger {
    pub fn new(repo: Repository) -> Self {
        Self { repo }
    }

    pub async fn record(&self, record: AccessRecord) {
        self.repo.write_access_log(record).await;
    }
}
