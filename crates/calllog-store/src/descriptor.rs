//! Strongly-typed query descriptors.
//!
//! A [`QueryDescriptor`] names exactly what a query wants: which calls
//! (kind, grouping mode, filters, group keys), which typed fields to project,
//! and which extra per-row columns to compute. Descriptors are validated by
//! [`QueryDescriptorBuilder::build`]; an unsupported combination never
//! reaches a store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use calllog_core::{CallType, GroupKey, GroupingMode};

use crate::errors::{Result, StoreError};

/// What a query returns.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum QueryKind {
    /// Calls for the grouped view, filtered by call type and reference time.
    Events,
    /// Every stored call of the given groups, ignoring view filters.
    GroupMembers,
}

/// A typed field of [`calllog_core::CallEvent`] a query may project.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EventField {
    /// Event id. Always required.
    Id,
    /// Start time.
    StartTime,
    /// End time.
    EndTime,
    /// Direction.
    Direction,
    /// Local account uid.
    LocalUid,
    /// Remote address.
    RemoteUid,
    /// Missed flag.
    IsMissedCall,
    /// Video flag.
    IsVideoCall,
    /// Read flag.
    IsRead,
    /// Resolved contacts.
    Contacts,
    /// Last modification time.
    LastModified,
}

impl EventField {
    /// Every field, in materialization order.
    pub const ALL: [Self; 11] = [
        Self::Id,
        Self::StartTime,
        Self::EndTime,
        Self::Direction,
        Self::LocalUid,
        Self::RemoteUid,
        Self::IsMissedCall,
        Self::IsVideoCall,
        Self::IsRead,
        Self::Contacts,
        Self::LastModified,
    ];
}

/// A per-row value outside the typed event schema.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ExtraColumn {
    /// Number of stored calls sharing the row's channel.
    ChannelTotal,
    /// Number of unread stored calls sharing the row's channel.
    ChannelUnread,
}

/// Validated query description handed to [`crate::EventStore::execute_query`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryDescriptor {
    kind: QueryKind,
    mode: GroupingMode,
    fields: Vec<EventField>,
    extra_columns: Vec<ExtraColumn>,
    call_type: CallType,
    reference_time: Option<DateTime<Utc>>,
    group_keys: Vec<GroupKey>,
    limit: Option<usize>,
}

impl QueryDescriptor {
    /// Start an [`QueryKind::Events`] descriptor for `mode`.
    pub fn events(mode: GroupingMode) -> QueryDescriptorBuilder {
        QueryDescriptorBuilder::new(QueryKind::Events, mode)
    }

    /// Start a [`QueryKind::GroupMembers`] descriptor for `mode`.
    pub fn group_members(mode: GroupingMode, keys: Vec<GroupKey>) -> QueryDescriptorBuilder {
        let mut builder = QueryDescriptorBuilder::new(QueryKind::GroupMembers, mode);
        builder.group_keys = keys;
        builder
    }

    /// Query kind.
    pub fn kind(&self) -> QueryKind {
        self.kind
    }

    /// Grouping mode the results are destined for.
    pub fn mode(&self) -> GroupingMode {
        self.mode
    }

    /// Projected typed fields.
    pub fn fields(&self) -> &[EventField] {
        &self.fields
    }

    /// Extra columns.
    pub fn extra_columns(&self) -> &[ExtraColumn] {
        &self.extra_columns
    }

    /// Call-type filter.
    pub fn call_type(&self) -> CallType {
        self.call_type
    }

    /// Lower bound on start time.
    pub fn reference_time(&self) -> Option<DateTime<Utc>> {
        self.reference_time
    }

    /// Group key filter; empty means no filter.
    pub fn group_keys(&self) -> &[GroupKey] {
        &self.group_keys
    }

    /// Row limit.
    pub fn limit(&self) -> Option<usize> {
        self.limit
    }

    /// Whether the store should apply the call-type filter itself.
    ///
    /// ByTime needs every call to see streak breaks, so it filters in the
    /// tree instead. Member lookups ignore view filters.
    pub fn filters_call_type(&self) -> bool {
        self.kind == QueryKind::Events
            && self.call_type != CallType::All
            && self.mode.is_contact_mode()
    }
}

/// Builder for [`QueryDescriptor`].
#[derive(Clone, Debug)]
pub struct QueryDescriptorBuilder {
    kind: QueryKind,
    mode: GroupingMode,
    fields: Vec<EventField>,
    extra_columns: Vec<ExtraColumn>,
    call_type: CallType,
    reference_time: Option<DateTime<Utc>>,
    group_keys: Vec<GroupKey>,
    limit: Option<usize>,
}

impl QueryDescriptorBuilder {
    fn new(kind: QueryKind, mode: GroupingMode) -> Self {
        Self {
            kind,
            mode,
            fields: EventField::ALL.to_vec(),
            extra_columns: Vec::new(),
            call_type: CallType::All,
            reference_time: None,
            group_keys: Vec::new(),
            limit: None,
        }
    }

    /// Project only `fields`.
    #[must_use]
    pub fn fields(mut self, fields: &[EventField]) -> Self {
        self.fields = fields.to_vec();
        self
    }

    /// Add an extra column.
    #[must_use]
    pub fn extra_column(mut self, column: ExtraColumn) -> Self {
        if !self.extra_columns.contains(&column) {
            self.extra_columns.push(column);
        }
        self
    }

    /// Filter by call type.
    #[must_use]
    pub fn call_type(mut self, call_type: CallType) -> Self {
        self.call_type = call_type;
        self
    }

    /// Only calls starting at or after `time`.
    #[must_use]
    pub fn reference_time(mut self, time: Option<DateTime<Utc>>) -> Self {
        self.reference_time = time;
        self
    }

    /// Only calls in these groups.
    #[must_use]
    pub fn group_keys(mut self, keys: Vec<GroupKey>) -> Self {
        self.group_keys = keys;
        self
    }

    /// At most `limit` rows.
    #[must_use]
    pub fn limit(mut self, limit: Option<usize>) -> Self {
        self.limit = limit;
        self
    }

    /// Validate and produce the descriptor.
    pub fn build(self) -> Result<QueryDescriptor> {
        if !self.mode.is_supported() {
            return Err(StoreError::InvalidDescriptor(format!(
                "grouping mode {} is not supported",
                self.mode
            )));
        }
        if !self.fields.contains(&EventField::Id) {
            return Err(StoreError::InvalidDescriptor("fields must include id".into()));
        }
        if self.kind == QueryKind::GroupMembers && self.group_keys.is_empty() {
            return Err(StoreError::InvalidDescriptor(
                "group member query needs at least one group key".into(),
            ));
        }
        if self.limit == Some(0) {
            return Err(StoreError::InvalidDescriptor("limit must be positive".into()));
        }
        let typed = self.mode.is_typed();
        if self.group_keys.iter().any(|k| k.kind.is_some() != typed) {
            return Err(StoreError::InvalidDescriptor(format!(
                "group keys do not match grouping mode {}",
                self.mode
            )));
        }

        let mut fields = self.fields;
        let mut seen = Vec::with_capacity(fields.len());
        fields.retain(|f| {
            let fresh = !seen.contains(f);
            if fresh {
                seen.push(*f);
            }
            fresh
        });

        Ok(QueryDescriptor {
            kind: self.kind,
            mode: self.mode,
            fields,
            extra_columns: self.extra_columns,
            call_type: self.call_type,
            reference_time: self.reference_time,
            group_keys: self.group_keys,
            limit: self.limit,
        })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use calllog_core::{CallEvent, Direction};
    use chrono::TimeZone;

    fn key(mode: GroupingMode) -> GroupKey {
        let event = CallEvent::new(
            1,
            "ring/tel/ring",
            "5551234567",
            Direction::Inbound,
            Utc.timestamp_opt(10, 0).unwrap(),
        );
        GroupKey::new(&event, mode, 7)
    }

    #[test]
    fn default_projection_is_full() {
        let d = QueryDescriptor::events(GroupingMode::ByTime).build().unwrap();
        assert_eq!(d.fields(), &EventField::ALL);
        assert_eq!(d.kind(), QueryKind::Events);
        assert!(d.group_keys().is_empty());
    }

    #[test]
    fn unsupported_modes_rejected() {
        for mode in [GroupingMode::ByType, GroupingMode::ByService] {
            assert_matches!(
                QueryDescriptor::events(mode).build(),
                Err(StoreError::InvalidDescriptor(_))
            );
        }
    }

    #[test]
    fn id_field_required() {
        let result = QueryDescriptor::events(GroupingMode::ByContact)
            .fields(&[EventField::StartTime])
            .build();
        assert_matches!(result, Err(StoreError::InvalidDescriptor(_)));
    }

    #[test]
    fn duplicate_fields_collapsed() {
        let d = QueryDescriptor::events(GroupingMode::ByContact)
            .fields(&[EventField::Id, EventField::IsRead, EventField::Id])
            .build()
            .unwrap();
        assert_eq!(d.fields(), &[EventField::Id, EventField::IsRead]);
    }

    #[test]
    fn group_members_need_keys() {
        assert_matches!(
            QueryDescriptor::group_members(GroupingMode::ByContact, vec![]).build(),
            Err(StoreError::InvalidDescriptor(_))
        );
        let d = QueryDescriptor::group_members(
            GroupingMode::ByContact,
            vec![key(GroupingMode::ByContact)],
        )
        .build()
        .unwrap();
        assert_eq!(d.kind(), QueryKind::GroupMembers);
    }

    #[test]
    fn key_shape_must_match_mode() {
        let result = QueryDescriptor::events(GroupingMode::ByContact)
            .group_keys(vec![key(GroupingMode::ByTime)])
            .build();
        assert_matches!(result, Err(StoreError::InvalidDescriptor(_)));
    }

    #[test]
    fn zero_limit_rejected() {
        assert_matches!(
            QueryDescriptor::events(GroupingMode::ByTime).limit(Some(0)).build(),
            Err(StoreError::InvalidDescriptor(_))
        );
    }

    #[test]
    fn call_type_filtered_in_store_for_contact_modes_only() {
        let contact = QueryDescriptor::events(GroupingMode::ByContact)
            .call_type(CallType::Missed)
            .build()
            .unwrap();
        let by_time = QueryDescriptor::events(GroupingMode::ByTime)
            .call_type(CallType::Missed)
            .build()
            .unwrap();
        let members = QueryDescriptor::group_members(
            GroupingMode::ByContact,
            vec![key(GroupingMode::ByContact)],
        )
        .call_type(CallType::Missed)
        .build()
        .unwrap();

        assert!(contact.filters_call_type());
        assert!(!by_time.filters_call_type());
        assert!(!members.filters_call_type());
    }

    #[test]
    fn extra_columns_deduplicated() {
        let d = QueryDescriptor::events(GroupingMode::ByContact)
            .extra_column(ExtraColumn::ChannelTotal)
            .extra_column(ExtraColumn::ChannelTotal)
            .extra_column(ExtraColumn::ChannelUnread)
            .build()
            .unwrap();
        assert_eq!(
            d.extra_columns(),
            &[ExtraColumn::ChannelTotal, ExtraColumn::ChannelUnread]
        );
    }
}
