//! Per-kind object behaviour.
//!
//! The canvas does not render anything itself; a widget only answers the
//! questions the reconciler, the snap engine and the resize gesture ask about
//! an object of its kind.

use std::fmt::Debug;

pub trait ObjectWidget: Debug {
    /// Type tag this widget was created for.
    fn kind(&self) -> &str;

    /// Width over height that a resize must keep, if any.
    fn fixed_ratio(&self) -> Option<f32> {
        None
    }

    /// Whether the object carries a separate label in the z-order.
    fn has_label(&self) -> bool {
        false
    }

    /// Whether iolets are drawn and connectable.
    fn shows_iolets(&self) -> bool {
        true
    }

    /// Smallest content size a resize may produce.
    fn minimum_size(&self) -> (i32, i32) {
        (25, 15)
    }

    fn can_resize(&self) -> bool {
        true
    }
}

/// A plain object box such as `osc~ 440`.
#[derive(Debug, Clone)]
pub struct TextObject {
    kind: String,
}

impl ObjectWidget for TextObject {
    fn kind(&self) -> &str {
        &self.kind
    }

    fn minimum_size(&self) -> (i32, i32) {
        (25, 20)
    }
}

#[derive(Debug, Clone, Default)]
pub struct MessageBox;

impl ObjectWidget for MessageBox {
    fn kind(&self) -> &str {
        "msg"
    }

    fn minimum_size(&self) -> (i32, i32) {
        (25, 20)
    }
}

#[derive(Debug, Clone, Default)]
pub struct Comment;

impl ObjectWidget for Comment {
    fn kind(&self) -> &str {
        "comment"
    }

    fn shows_iolets(&self) -> bool {
        false
    }
}

/// IEM-style control with an optional label and, for square controls, a
/// locked aspect ratio.
#[derive(Debug, Clone)]
pub struct GuiControl {
    kind: String,
    square: bool,
}

impl ObjectWidget for GuiControl {
    fn kind(&self) -> &str {
        &self.kind
    }

    fn fixed_ratio(&self) -> Option<f32> {
        self.square.then_some(1.0)
    }

    fn has_label(&self) -> bool {
        true
    }

    fn minimum_size(&self) -> (i32, i32) {
        if self.square { (15, 15) } else { (8, 8) }
    }
}

/// Pick the widget implementation for a document type tag.
pub fn create_widget(kind: &str) -> Box<dyn ObjectWidget> {
    match kind {
        "msg" => Box::new(MessageBox),
        "comment" => Box::new(Comment),
        "tgl" | "bng" => Box::new(GuiControl {
            kind: kind.to_string(),
            square: true,
        }),
        "hsl" | "vsl" | "hradio" | "vradio" | "nbx" | "knob" | "cnv" | "vu" => {
            Box::new(GuiControl {
                kind: kind.to_string(),
                square: false,
            })
        }
        _ => Box::new(TextObject {
            kind: kind.to_string(),
        }),
    }
}
