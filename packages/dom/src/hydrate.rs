//! The hydration bridge.
//!
//! On client start the embedding walks the server-rendered document into a
//! [`ScannedNode`] tree: elements with their attributes and hydration
//! markers, opaque text, fragment boundaries, portal placeholders. The
//! bridge turns the scan into a sparse previous tree, seeds the applier and
//! the diff session so both agree on ids, renders nothing itself - the
//! component's authoritative tree comes in from outside - and reconciles.
//!
//! A well-formed hydration only produces attribute, text, and event-mask
//! patches (plus inserts under portals, whose content is deliberately absent
//! from the document). Any other structural patch is drift: lenient policy
//! applies it anyway and reports, strict policy refuses and escalates to a
//! full resync.

use rustc_hash::FxHashSet;
use tracing::warn;
use vango_core::{DiffSession, HandlerId, MountedNode, NodeId, Patch, PropValue, Props, VNode};

use crate::applier::{ApplyError, HostApplier};
use crate::host::Host;

/// One node of the embedding's document walk.
pub struct ScannedNode<Handle> {
    pub kind: ScannedKind,
    pub handle: Handle,
    pub children: Vec<ScannedNode<Handle>>,
}

pub enum ScannedKind {
    Element {
        tag: String,
        /// Markup attributes, the hydration markers already stripped.
        attrs: Props,
        /// Value of `data-hid`, if the element carried one.
        hid: Option<String>,
        /// Mask parsed from `data-events`, 0 when absent.
        events: u32,
    },
    Text(String),
    Fragment,
    Portal {
        target: String,
    },
}

/// Hydration policy.
#[derive(Debug, Clone, Copy, Default)]
pub struct HydrateConfig {
    /// Refuse to patch over structural drift; the caller escalates to a
    /// full resync instead.
    pub strict: bool,
}

/// A structural disagreement between the document and the component output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HydrationDrift {
    pub path: String,
    pub reason: String,
}

#[derive(Debug, thiserror::Error)]
pub enum HydrationError {
    #[error("hydration drift under strict policy ({0:?})")]
    Drift(Vec<HydrationDrift>),
    #[error(transparent)]
    Apply(#[from] ApplyError),
}

/// What a hydration did.
#[derive(Debug)]
pub struct HydrationReport {
    /// Patches applied to align the document with the component output.
    pub patches_applied: usize,
    /// Structural disagreements (empty on a clean hydrate).
    pub drift: Vec<HydrationDrift>,
    /// Shadow of the authoritative tree; becomes the fiber's retained state.
    pub shadow: Option<MountedNode>,
}

/// Reconcile a server-rendered document with the component's authoritative
/// tree, preserving DOM identity for everything that matches.
pub fn hydrate<H: Host>(
    applier: &mut HostApplier<H>,
    session: &mut DiffSession,
    scanned: &ScannedNode<H::Handle>,
    authoritative: &VNode,
    config: HydrateConfig,
) -> Result<HydrationReport, HydrationError> {
    let sparse = sparse_tree(scanned);
    let mounted = session.mount(&sparse);
    adopt_all(applier, NodeId::ROOT, scanned, &mounted);
    applier.set_next_id(session.next_id());

    let (patches, shadow) = session.diff(Some((&sparse, &mounted)), Some(authoritative));

    let mut portal_ids = FxHashSet::default();
    if let Some(shadow) = &shadow {
        collect_portal_ids(authoritative, shadow, &mut portal_ids);
    }

    let drift: Vec<HydrationDrift> = patches
        .iter()
        .filter(|patch| patch.is_structural())
        .filter(|patch| {
            // Portal content is never in the document; materializing it now
            // is the expected path, not drift.
            !matches!(patch, Patch::InsertNode { parent, .. } if portal_ids.contains(parent))
        })
        .map(|patch| HydrationDrift {
            path: patch.target().to_string(),
            reason: format!("unexpected structural patch: {patch:?}"),
        })
        .collect();

    if !drift.is_empty() {
        warn!(count = drift.len(), "hydration drift detected");
        if config.strict {
            return Err(HydrationError::Drift(drift));
        }
    }

    applier.apply(&patches)?;

    Ok(HydrationReport {
        patches_applied: patches.len(),
        drift,
        shadow,
    })
}

/// Lower a scan into the sparse previous tree the diff runs against.
/// Subscribed events become synthetic handler props so mask comparison
/// falls out of the ordinary prop diff.
pub fn sparse_tree<Handle>(scanned: &ScannedNode<Handle>) -> VNode {
    let children: Vec<VNode> = scanned.children.iter().map(sparse_tree).collect();
    match &scanned.kind {
        ScannedKind::Element {
            tag,
            attrs,
            hid: _,
            events,
        } => {
            let mut props = attrs.clone();
            for bit in 0..32u8 {
                if events & (1 << bit) != 0 {
                    props.insert(synthetic_event_prop(bit), PropValue::Handler(HandlerId(0)));
                }
            }
            VNode::element(tag.clone(), props, children)
        }
        ScannedKind::Text(text) => VNode::text(text.clone()),
        ScannedKind::Fragment => VNode::fragment(children),
        ScannedKind::Portal { target } => VNode::portal(target.clone(), children),
    }
}

/// `click` -> `onClick`, so the synthesized prop classifies as an event and
/// lands on the same bit.
fn synthetic_event_prop(bit: u8) -> String {
    let name = vango_core::events::bit_name(bit);
    let mut prop = String::with_capacity(2 + name.len());
    prop.push_str("on");
    let mut chars = name.chars();
    if let Some(first) = chars.next() {
        prop.push(first.to_ascii_uppercase());
    }
    prop.push_str(chars.as_str());
    prop
}

fn adopt_all<H: Host>(
    applier: &mut HostApplier<H>,
    parent: NodeId,
    scanned: &ScannedNode<H::Handle>,
    mounted: &MountedNode,
) {
    let mask = match &scanned.kind {
        ScannedKind::Element { events, .. } => *events,
        _ => 0,
    };
    applier.adopt(parent, mounted.id, scanned.handle.clone(), mask);
    for (child, child_mounted) in scanned.children.iter().zip(&mounted.children) {
        adopt_all(applier, mounted.id, child, child_mounted);
    }
}

fn collect_portal_ids(tree: &VNode, shadow: &MountedNode, out: &mut FxHashSet<NodeId>) {
    if matches!(tree, VNode::Portal(_)) {
        out.insert(shadow.id);
    }
    for (child, child_shadow) in tree.children().iter().zip(&shadow.children) {
        collect_portal_ids(child, child_shadow, out);
    }
}
