/// Binding of an authenticated edge system to its owning tenant.
///
/// The tenant-id is the unit of ordering, batching, ownership, and
/// pass-through scoping across the whole pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TenantBinding {
    pub system_id: String,
    pub tenant_id: String,
}

impl TenantBinding {
    /// Composite key used for the Heartbeat Store's primary key.
    pub fn tenant_system_id(&self) -> String {
        format!("{}:{}", self.tenant_id, self.system_id)
    }
}
