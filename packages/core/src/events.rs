//! Event prop classification and the wire-level event bitmask.
//!
//! A prop key names an event subscription when it is `on` followed by an
//! uppercase letter (`onClick`, `onKeyDown`). The suffix is canonicalized to
//! lowercase at this boundary; hosts and the wire only ever see bit
//! positions.

use crate::node::Props;

pub const CLICK: u8 = 0;
pub const CHANGE: u8 = 1;
pub const INPUT: u8 = 2;
pub const SUBMIT: u8 = 3;
pub const FOCUS: u8 = 4;
pub const BLUR: u8 = 5;
pub const KEYDOWN: u8 = 6;
pub const KEYUP: u8 = 7;
pub const MOUSEDOWN: u8 = 8;
pub const MOUSEUP: u8 = 9;
pub const MOUSEMOVE: u8 = 10;
pub const MOUSEENTER: u8 = 11;
pub const MOUSELEAVE: u8 = 12;

/// Events without a fixed position all share the sentinel bit.
pub const UNKNOWN: u8 = 31;

/// Is this prop key an event subscription?
pub fn is_event_prop(name: &str) -> bool {
    let mut chars = name.chars();
    chars.next() == Some('o')
        && chars.next() == Some('n')
        && chars.next().is_some_and(|c| c.is_ascii_uppercase())
}

/// Canonical (lowercase) event name of an event prop, if it is one.
pub fn event_name(prop: &str) -> Option<String> {
    is_event_prop(prop).then(|| prop[2..].to_ascii_lowercase())
}

/// Fixed bit position for a canonical event name.
pub fn event_bit(event: &str) -> u8 {
    match event {
        "click" => CLICK,
        "change" => CHANGE,
        "input" => INPUT,
        "submit" => SUBMIT,
        "focus" => FOCUS,
        "blur" => BLUR,
        "keydown" => KEYDOWN,
        "keyup" => KEYUP,
        "mousedown" => MOUSEDOWN,
        "mouseup" => MOUSEUP,
        "mousemove" => MOUSEMOVE,
        "mouseenter" => MOUSEENTER,
        "mouseleave" => MOUSELEAVE,
        _ => UNKNOWN,
    }
}

/// Human-readable name for a bit position, for logs and diagnostics.
pub fn bit_name(bit: u8) -> &'static str {
    match bit {
        CLICK => "click",
        CHANGE => "change",
        INPUT => "input",
        SUBMIT => "submit",
        FOCUS => "focus",
        BLUR => "blur",
        KEYDOWN => "keydown",
        KEYUP => "keyup",
        MOUSEDOWN => "mousedown",
        MOUSEUP => "mouseup",
        MOUSEMOVE => "mousemove",
        MOUSEENTER => "mouseenter",
        MOUSELEAVE => "mouseleave",
        _ => "unknown",
    }
}

/// Fold every event prop in `props` into a bitmask.
pub fn mask_of(props: &Props) -> u32 {
    let mut mask = 0u32;
    for (name, _) in props.iter() {
        if let Some(event) = event_name(name) {
            mask |= 1 << event_bit(&event);
        }
    }
    mask
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::{HandlerId, Props};

    #[test]
    fn event_props_need_an_uppercase_letter() {
        assert!(is_event_prop("onClick"));
        assert!(is_event_prop("onMouseEnter"));
        assert!(!is_event_prop("onclick"));
        assert!(!is_event_prop("on"));
        assert!(!is_event_prop("once"));
    }

    #[test]
    fn names_canonicalize_to_lowercase() {
        assert_eq!(event_name("onKeyDown").as_deref(), Some("keydown"));
        assert_eq!(event_name("onCLICK").as_deref(), Some("click"));
        assert_eq!(event_name("class"), None);
    }

    #[test]
    fn unknown_events_share_the_sentinel_bit() {
        assert_eq!(event_bit("pointerdown"), UNKNOWN);
        let props = Props::new()
            .with("onPointerDown", HandlerId(1))
            .with("onPointerUp", HandlerId(2));
        assert_eq!(mask_of(&props), 1 << UNKNOWN);
    }

    #[test]
    fn mask_folds_all_subscriptions() {
        let props = Props::new()
            .with("onClick", HandlerId(1))
            .with("onBlur", HandlerId(2))
            .with("class", "x");
        assert_eq!(mask_of(&props), (1 << CLICK) | (1 << BLUR));
    }
}
