//! NodeTemplate aggregate: a reusable node blueprint.

use chrono::{DateTime, Utc};

use flowgraph_core::{Aggregate, AggregateId, AggregateMeta, DomainEvent};

use crate::events;

#[derive(Debug, Clone)]
pub struct NodeTemplate {
    meta: AggregateMeta,
    pub name: String,
}

impl NodeTemplate {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        let id = AggregateId::new();
        let mut template = Self {
            meta: AggregateMeta::new(id),
            name,
        };
        template.record(events::create_node_template(id, &template.name));
        template
    }

    pub fn reconstitute(
        id: AggregateId,
        name: String,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
    ) -> Self {
        Self {
            meta: AggregateMeta::reconstitute(id, created_at, updated_at),
            name,
        }
    }

    pub fn id(&self) -> AggregateId {
        self.meta.id()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.meta.created_at()
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.meta.updated_at()
    }

    pub fn update_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
        self.meta.touch(Utc::now());
        self.record(events::update_node_template(self.id(), &self.name));
    }
}

impl Aggregate for NodeTemplate {
    fn aggregate_id(&self) -> AggregateId {
        self.meta.id()
    }

    fn record(&mut self, event: DomainEvent) {
        self.meta.record(event);
    }

    fn pending_events(&self) -> &[DomainEvent] {
        self.meta.pending_events()
    }

    fn clear_events(&mut self) {
        self.meta.clear_events();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn creation_buffers_a_create_event() {
        let template = NodeTemplate::new("http-request");
        let events = template.pending_events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_type(), "CreateNodeTemplate");
        assert_eq!(events[0].aggregate_type(), "NodeTemplate");
        assert_eq!(events[0].payload()["name"], "http-request");
    }

    #[test]
    fn update_name_buffers_event_and_touches_timestamp() {
        let mut template = NodeTemplate::new("http-request");
        let created = template.created_at();
        template.clear_events();

        template.update_name("graphql-request");

        assert_eq!(template.name, "graphql-request");
        assert_eq!(template.pending_events().len(), 1);
        assert_eq!(template.pending_events()[0].event_type(), "UpdateNodeTemplate");
        assert_eq!(template.created_at(), created);
        assert!(template.updated_at() >= created);
    }
}
