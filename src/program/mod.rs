//! Falcon Program Model
//!
//! Typed views over a program document. Entities ([`Macro`], [`Effect`],
//! [`Modulation`], [`ScriptProcessor`]) are `Copy` handles onto document
//! nodes; every read and write goes straight to the tree, so there is no
//! separate in-memory state to keep in sync.
//!
//! [`FalconProgram`] ties the entities of one document together. The
//! task-level edits live in [`ccs`] and [`editing`].

pub mod ccs;
pub mod connections;
pub mod editing;
pub mod location;
pub mod macros;
pub mod modulation;
pub mod references;
pub mod script;
pub mod templates;

use std::fmt;
use std::path::Path;

use log::debug;

use crate::document::{Document, NodeId};
use crate::error::{ConverterError, Result};

pub use connections::{Effect, EffectFamily};
pub use location::MacroLocation;
pub use macros::{Macro, MacroStyle};
pub use modulation::{Modulation, ModulationOwner, ModulationSource};
pub use references::MacroReferences;
pub use script::{ScriptDialect, ScriptProcessor};
pub use templates::Templates;

use connections::{CONNECTIONS_ELEMENT, INSERTS_ELEMENT};
use macros::{macro_name, MACRO_ELEMENT, PROPERTIES_ELEMENT};
use script::{macro_slot_number, EVENT_PROCESSORS_ELEMENT, SCRIPT_PROCESSOR_ELEMENT};

pub const PROGRAM_ELEMENT: &str = "Program";
pub const CONTROL_SIGNAL_SOURCES_ELEMENT: &str = "ControlSignalSources";
pub const LAYER_ELEMENT: &str = "Layer";
const DESCRIPTION_ATTRIBUTE: &str = "description";

/// Where a program sits in the programs folder tree.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct ProgramPath {
    pub sound_bank: String,
    pub category: String,
    pub program: String,
}

impl ProgramPath {
    pub fn new(
        sound_bank: impl Into<String>,
        category: impl Into<String>,
        program: impl Into<String>,
    ) -> Self {
        Self {
            sound_bank: sound_bank.into(),
            category: category.into(),
            program: program.into(),
        }
    }

    /// Derive the path from `<sound bank>/<category>/<program>.<ext>`.
    pub fn from_file(path: &Path) -> Self {
        let name = |p: Option<&Path>| -> String {
            p.and_then(Path::file_name)
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default()
        };
        let category_folder = path.parent();
        Self {
            sound_bank: name(category_folder.and_then(Path::parent)),
            category: name(category_folder),
            program: path
                .file_stem()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
        }
    }
}

impl fmt::Display for ProgramPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}\\{}\\{}", self.sound_bank, self.category, self.program)
    }
}

/// Result of applying one edit to one program.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditOutcome {
    Changed,
    Unchanged,
    /// The edit does not apply to this program.
    Skipped(String),
}

impl EditOutcome {
    pub fn is_changed(&self) -> bool {
        matches!(self, EditOutcome::Changed)
    }

    pub(crate) fn from_changed(changed: bool) -> Self {
        if changed {
            EditOutcome::Changed
        } else {
            EditOutcome::Unchanged
        }
    }
}

/// One loaded program document.
#[derive(Debug, Clone)]
pub struct FalconProgram {
    doc: Document,
    program: NodeId,
    path: ProgramPath,
    templates: Templates,
}

impl FalconProgram {
    /// Load a program file, deriving its location from the file path.
    pub fn load(file: &Path) -> Result<Self> {
        let doc = Document::load(file)?;
        Self::from_document(doc, ProgramPath::from_file(file))
    }

    pub fn from_document(doc: Document, path: ProgramPath) -> Result<Self> {
        let program = if doc.name(doc.root()) == PROGRAM_ELEMENT {
            doc.root()
        } else {
            doc.descendants_named(doc.root(), PROGRAM_ELEMENT)
                .first()
                .copied()
                .ok_or_else(|| ConverterError::MissingElement {
                    element: PROGRAM_ELEMENT.to_string(),
                    parent: doc.name(doc.root()).to_string(),
                    path: doc.path().to_path_buf(),
                })?
        };
        Ok(Self {
            doc,
            program,
            path,
            templates: Templates::embedded()?,
        })
    }

    pub fn document(&self) -> &Document {
        &self.doc
    }

    pub fn document_mut(&mut self) -> &mut Document {
        &mut self.doc
    }

    pub fn into_document(self) -> Document {
        self.doc
    }

    pub fn path(&self) -> &ProgramPath {
        &self.path
    }

    pub fn program_node(&self) -> NodeId {
        self.program
    }

    pub fn templates(&self) -> &Templates {
        &self.templates
    }

    // === Macros ===

    /// Macros in document order. A program without `ControlSignalSources`
    /// has none.
    pub fn macros(&self) -> Vec<Macro> {
        match self
            .doc
            .child_named(self.program, CONTROL_SIGNAL_SOURCES_ELEMENT)
        {
            Some(sources) => self
                .doc
                .children_named(sources, MACRO_ELEMENT)
                .into_iter()
                .map(Macro::bind)
                .collect(),
            None => Vec::new(),
        }
    }

    pub fn find_macro(&self, name: &str) -> Result<Option<Macro>> {
        for m in self.macros() {
            if m.name(&self.doc)? == name {
                return Ok(Some(m));
            }
        }
        Ok(None)
    }

    pub fn find_macro_by_display_name(&self, display_name: &str) -> Result<Option<Macro>> {
        for m in self.macros() {
            if m.display_name(&self.doc)? == display_name {
                return Ok(Some(m));
            }
        }
        Ok(None)
    }

    /// Macros in Info page reading order.
    pub fn macros_in_location_order(&self, tolerance: i64) -> Result<Vec<Macro>> {
        let mut items = Vec::new();
        for m in self.macros() {
            items.push((m, m.location(&self.doc)?));
        }
        location::order_by_location(items, tolerance, self.doc.path())
    }

    /// Add a macro after the existing ones, numbered one above the highest
    /// macro number in use.
    pub fn add_macro(
        &mut self,
        display_name: &str,
        style: MacroStyle,
        x: i64,
        y: i64,
    ) -> Result<Macro> {
        let mut highest = 0;
        for m in self.macros() {
            highest = highest.max(m.macro_no(&self.doc)?);
        }
        let sources = match self
            .doc
            .child_named(self.program, CONTROL_SIGNAL_SOURCES_ELEMENT)
        {
            Some(sources) => sources,
            None => {
                let sources = self.doc.create_element(CONTROL_SIGNAL_SOURCES_ELEMENT);
                self.doc.append_child(self.program, sources);
                sources
            }
        };
        let node = self.templates.new_macro(&mut self.doc);
        self.doc.append_child(sources, node);

        let added = Macro::bind(node);
        added.set_name(&mut self.doc, &macro_name(highest + 1));
        added.set_display_name(&mut self.doc, display_name);
        added.set_style(&mut self.doc, style);
        added.set_value(&mut self.doc, 0.0);
        added.set_location(&mut self.doc, x, y)?;
        debug!("Added {} '{}' to {}", macro_name(highest + 1), display_name, self.path);
        Ok(added)
    }

    /// Remove a macro and every modulation it sources. On a script-driven
    /// program the script slot with the macro's number goes too.
    pub fn remove_macro(&mut self, m: Macro) -> Result<()> {
        let macro_no = m.macro_no(&self.doc)?;
        let references = self.macro_references()?;
        m.remove_element(&mut self.doc, &references)?;
        if let Some(processor) = self.info_page_script_processor() {
            for (slot, modulation) in processor.slot_modulations(&self.doc)? {
                if slot == macro_no {
                    self.remove_modulation(modulation);
                }
            }
        }
        Ok(())
    }

    // === Effects, layers and script processors ===

    /// Insert effects of the program and all of its layers.
    pub fn effects(&self) -> Vec<Effect> {
        self.doc
            .descendants_named(self.program, INSERTS_ELEMENT)
            .into_iter()
            .flat_map(|inserts| self.doc.children(inserts).to_vec())
            .map(Effect::bind)
            .collect()
    }

    pub fn layers(&self) -> Vec<NodeId> {
        self.doc.descendants_named(self.program, LAYER_ELEMENT)
    }

    pub fn script_processors(&self) -> Vec<ScriptProcessor> {
        self.doc
            .descendants_named(self.program, EVENT_PROCESSORS_ELEMENT)
            .into_iter()
            .flat_map(|processors| {
                self.doc
                    .children_named(processors, SCRIPT_PROCESSOR_ELEMENT)
            })
            .map(ScriptProcessor::bind)
            .collect()
    }

    /// The script processor defining the Info page, if the program has one
    /// with a recognised dialect.
    pub fn info_page_script_processor(&self) -> Option<ScriptProcessor> {
        let sound_bank = &self.path.sound_bank;
        let direct = self
            .doc
            .child_named(self.program, EVENT_PROCESSORS_ELEMENT)
            .map(|processors| {
                self.doc
                    .children_named(processors, SCRIPT_PROCESSOR_ELEMENT)
            })
            .unwrap_or_default();
        direct
            .into_iter()
            .map(ScriptProcessor::bind)
            .find(|processor| processor.dialect(&self.doc, sound_bank).is_script_driven())
    }

    pub fn dialect(&self) -> ScriptDialect {
        self.info_page_script_processor()
            .map(|processor| processor.dialect(&self.doc, &self.path.sound_bank))
            .unwrap_or(ScriptDialect::None)
    }

    pub fn is_script_driven(&self) -> bool {
        self.dialect().is_script_driven()
    }

    // === Modulations ===

    /// Every element owning a `Connections` container, classified by kind.
    pub fn owners(&self) -> Vec<ModulationOwner> {
        let macros = self.macros();
        let mut owners = Vec::new();
        for connections in self.doc.descendants_named(self.doc.root(), CONNECTIONS_ELEMENT) {
            let Some(parent) = self.doc.parent(connections) else {
                continue;
            };
            let owner = if macros.iter().any(|m| m.node() == parent) {
                ModulationOwner::Macro(parent)
            } else if self.doc.name(parent) == SCRIPT_PROCESSOR_ELEMENT {
                ModulationOwner::ScriptProcessor(parent)
            } else {
                ModulationOwner::Effect(parent)
            };
            if !owners.contains(&owner) {
                owners.push(owner);
            }
        }
        owners
    }

    pub fn all_modulations(&self) -> Vec<Modulation> {
        self.owners()
            .into_iter()
            .flat_map(|owner| connections::modulations(&self.doc, owner))
            .collect()
    }

    /// Index of the modulations sourced from each macro, as of now.
    pub fn macro_references(&self) -> Result<MacroReferences> {
        MacroReferences::build(&self.doc, self.owners())
    }

    pub fn modulations_targeting_macros(&self) -> Result<Vec<Modulation>> {
        let mut result = Vec::new();
        for modulation in self.all_modulations() {
            if modulation.modulates_macro(&self.doc)? {
                result.push(modulation);
            }
        }
        Ok(result)
    }

    /// First macro-targeting modulation mapped to `cc`.
    pub fn find_modulation_by_cc_no(&self, cc: u32) -> Result<Option<Modulation>> {
        for modulation in self.modulations_targeting_macros()? {
            if modulation.cc_no(&self.doc)? == Some(cc) {
                return Ok(Some(modulation));
            }
        }
        Ok(None)
    }

    /// Add a modulation from the template to `owner`.
    pub fn add_modulation(&mut self, owner: ModulationOwner) -> Modulation {
        let node = self.templates.new_modulation(&mut self.doc);
        connections::add_modulation(&mut self.doc, owner, node)
    }

    pub fn remove_modulation(&mut self, modulation: Modulation) {
        connections::remove_modulation(&mut self.doc, modulation);
    }

    // === Description ===

    pub fn description(&self) -> &str {
        self.doc
            .child_named(self.program, PROPERTIES_ELEMENT)
            .and_then(|properties| self.doc.attribute(properties, DESCRIPTION_ATTRIBUTE))
            .unwrap_or("")
    }

    pub fn set_description(&mut self, description: &str) {
        let properties = match self.doc.child_named(self.program, PROPERTIES_ELEMENT) {
            Some(properties) => properties,
            None => {
                let properties = self.doc.create_element(PROPERTIES_ELEMENT);
                self.doc.append_child(self.program, properties);
                properties
            }
        };
        self.doc
            .set_attribute(properties, DESCRIPTION_ATTRIBUTE, description);
    }

    /// Script slot numbers in use on the Info page script processor.
    pub fn script_slots(&self) -> Result<Vec<u32>> {
        let mut slots = Vec::new();
        if let Some(processor) = self.info_page_script_processor() {
            for modulation in processor.modulations(&self.doc) {
                if let Some(slot) = macro_slot_number(modulation.destination(&self.doc)?) {
                    slots.push(slot);
                }
            }
        }
        Ok(slots)
    }
}

#[cfg(test)]
pub(crate) mod test_programs {
    //! Program documents shared by the program and batch tests.

    /// Three macros, a delay modulated by Macro 2, a reverb modulated by
    /// Macro 3 and a mod wheel mapping on the program.
    pub const PLAIN: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<UVI4>
    <Program Name="Pad" Bypass="0">
        <Properties description="Warm pad"/>
        <ControlSignalSources>
            <ConstantModulation Name="Macro 1" Bypass="0" DisplayName="Cutoff" Style="0" Value="0.5" Bipolar="0">
                <Properties showValue="0" x="20" y="118"/>
            </ConstantModulation>
            <ConstantModulation Name="Macro 2" Bypass="0" DisplayName="Delay" Style="0" Value="0.3" Bipolar="0">
                <Properties showValue="0" x="120" y="120"/>
            </ConstantModulation>
            <ConstantModulation Name="Macro 3" Bypass="0" DisplayName="Reverb On" Style="1" Value="1" Bipolar="0">
                <Properties showValue="0" x="20" y="213"/>
            </ConstantModulation>
        </ControlSignalSources>
        <Connections>
            <SignalConnection Ratio="1" Source="@MIDI CC 1" Destination="Gain" ConnectionMode="0"/>
        </Connections>
        <Inserts>
            <SimpleDelay Name="Delay" Bypass="0">
                <Connections>
                    <SignalConnection Ratio="1" Source="$Program/Macro 2" Destination="Mix" ConnectionMode="0"/>
                </Connections>
            </SimpleDelay>
            <SparkVerb Name="Reverb" Bypass="0">
                <Connections>
                    <SignalConnection Ratio="1" Source="$Program/Macro 3" Destination="Bypass" ConnectionMode="0"/>
                </Connections>
            </SparkVerb>
        </Inserts>
        <Layers>
            <Layer Name="Layer 1">
                <Inserts>
                    <Compressor Name="Comp" Bypass="0"/>
                </Inserts>
            </Layer>
        </Layers>
    </Program>
</UVI4>
"#;

    /// An OrganicTexture program whose script slots use placeholders.
    pub const ORGANIC: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<UVI4>
    <Program Name="Texture" Bypass="0">
        <ControlSignalSources>
            <ConstantModulation Name="Macro 1" Bypass="0" DisplayName="Grain" Style="0" Value="0" Bipolar="0">
                <Properties showValue="0" x="20" y="118"/>
            </ConstantModulation>
            <ConstantModulation Name="Macro 2" Bypass="0" DisplayName="Space" Style="0" Value="0" Bipolar="0">
                <Properties showValue="0" x="120" y="118"/>
            </ConstantModulation>
            <ConstantModulation Name="Macro 3" Bypass="0" DisplayName="Motion" Style="0" Value="0" Bipolar="0">
                <Properties showValue="0" x="220" y="118"/>
            </ConstantModulation>
        </ControlSignalSources>
        <EventProcessors>
            <ScriptProcessor Name="EventProcessor0" Bypass="0">
                <Connections>
                    <SignalConnection Ratio="1" Source="@MIDI CC C1" Destination="Macro1" ConnectionMode="0"/>
                    <SignalConnection Ratio="1" Source="@MIDI CC C2" Destination="Macro2" ConnectionMode="0"/>
                    <SignalConnection Ratio="1" Source="@MIDI CC T1" Destination="Macro3" ConnectionMode="0"/>
                </Connections>
                <Properties ScriptPath="./../../../Scripts/OrganicTexture.lua"/>
                <script><![CDATA[require("OrganicTexture")]]></script>
            </ScriptProcessor>
        </EventProcessors>
    </Program>
</UVI4>
"#;
}
