//! Connections containers and insert effects.
//!
//! Any element may own a `Connections` child holding modulations. The
//! container exists exactly when it holds at least one modulation: adding
//! the first modulation creates it and removing the last one deletes it.

use crate::document::{Document, NodeId};
use crate::error::Result;

use super::modulation::{Modulation, ModulationOwner, MODULATION_ELEMENT};

/// Element name of a connections container.
pub const CONNECTIONS_ELEMENT: &str = "Connections";

/// Element name of an insert effect chain.
pub const INSERTS_ELEMENT: &str = "Inserts";

/// Effect types belonging to the delay family.
pub const DELAY_TYPES: &[&str] = &[
    "AnalogTapeDelay",
    "DualDelay",
    "DualDelayX",
    "MultitapDelay",
    "PingPongDelay",
    "SimpleDelay",
    "StereoDelay",
    "TapeEcho",
];

/// Effect types belonging to the reverb family.
pub const REVERB_TYPES: &[&str] = &[
    "Diffuse",
    "GigaVerb",
    "PlateReverb",
    "PrimeVerb",
    "SampleBasedReverb",
    "SparkVerb",
];

/// Modulations owned by `owner`, in document order.
pub fn modulations(doc: &Document, owner: ModulationOwner) -> Vec<Modulation> {
    match doc.child_named(owner.node(), CONNECTIONS_ELEMENT) {
        Some(connections) => doc
            .children_named(connections, MODULATION_ELEMENT)
            .into_iter()
            .map(|node| Modulation::bind(node, owner))
            .collect(),
        None => Vec::new(),
    }
}

/// Append a detached modulation element to `owner`, creating the
/// `Connections` container if needed.
pub fn add_modulation(doc: &mut Document, owner: ModulationOwner, node: NodeId) -> Modulation {
    let connections = match doc.child_named(owner.node(), CONNECTIONS_ELEMENT) {
        Some(connections) => connections,
        None => {
            let connections = doc.create_element(CONNECTIONS_ELEMENT);
            // Falcon writes Connections as the first child.
            doc.insert_child(owner.node(), 0, connections);
            connections
        }
    };
    doc.append_child(connections, node);
    Modulation::bind(node, owner)
}

/// Remove a modulation, deleting its container when left empty.
pub fn remove_modulation(doc: &mut Document, modulation: Modulation) {
    let connections = doc.parent(modulation.node());
    doc.detach(modulation.node());
    if let Some(connections) = connections {
        if doc.children(connections).is_empty() {
            doc.detach(connections);
        }
    }
}

/// Family of an insert effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EffectFamily {
    Delay,
    Reverb,
    Other,
}

impl EffectFamily {
    pub fn of(effect_type: &str) -> Self {
        if DELAY_TYPES.contains(&effect_type) {
            EffectFamily::Delay
        } else if REVERB_TYPES.contains(&effect_type) {
            EffectFamily::Reverb
        } else {
            EffectFamily::Other
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            EffectFamily::Delay => "delay",
            EffectFamily::Reverb => "reverb",
            EffectFamily::Other => "other",
        }
    }
}

/// An insert effect. Its element name is its type tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Effect {
    node: NodeId,
}

impl Effect {
    pub fn bind(node: NodeId) -> Self {
        Self { node }
    }

    pub fn node(&self) -> NodeId {
        self.node
    }

    pub fn owner(&self) -> ModulationOwner {
        ModulationOwner::Effect(self.node)
    }

    pub fn name<'d>(&self, doc: &'d Document) -> Result<&'d str> {
        doc.required_attribute(self.node, "Name")
    }

    pub fn effect_type<'d>(&self, doc: &'d Document) -> &'d str {
        doc.name(self.node)
    }

    pub fn family(&self, doc: &Document) -> EffectFamily {
        EffectFamily::of(self.effect_type(doc))
    }

    pub fn modulations(&self, doc: &Document) -> Vec<Modulation> {
        modulations(doc, self.owner())
    }
}
