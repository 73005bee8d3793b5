use std::fmt;
use std::time::Duration;

/// Default surface size in pixels when an embed does not request one.
pub const DEFAULT_SURFACE_SIZE: (u32, u32) = (640, 360);
/// CSS class stamped on every generated canvas.
pub const DEFAULT_CANVAS_CLASS: &str = "shaderblock-canvas";
/// Prefix for generated element ids.
pub const DEFAULT_ID_PREFIX: &str = "shaderblock-";
/// `iTime` wraps after this long to bound floating-point growth.
pub const DEFAULT_TIME_WRAP: Duration = Duration::from_secs(100);

/// Identifier of one embedded shader, unique for the lifetime of its context.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InstanceId {
    seq: u64,
    element: String,
}

impl InstanceId {
    pub fn seq(&self) -> u64 {
        self.seq
    }

    /// Value of the generated canvas `id` attribute.
    pub fn element_id(&self) -> &str {
        &self.element
    }
}

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.element)
    }
}

/// Source of instance identifiers for one page load.
///
/// Hosts create one context per page and hand it to the instance manager;
/// tests can start the counter anywhere.
#[derive(Debug, Clone)]
pub struct InstanceContext {
    next: u64,
    prefix: String,
}

impl InstanceContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            next: 0,
            prefix: prefix.into(),
        }
    }

    /// Starts numbering at `first` instead of zero.
    pub fn starting_at(mut self, first: u64) -> Self {
        self.next = first;
        self
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn next_id(&mut self) -> InstanceId {
        let seq = self.next;
        self.next = self.next.saturating_add(1);
        InstanceId {
            seq,
            element: format!("{}{}", self.prefix, seq),
        }
    }
}

impl Default for InstanceContext {
    fn default() -> Self {
        Self::with_prefix(DEFAULT_ID_PREFIX)
    }
}

/// Options shared by every instance an [`InstanceManager`](crate::InstanceManager) creates.
#[derive(Debug, Clone, PartialEq)]
pub struct EmbedOptions {
    /// Canvas size in pixels for embeds that do not override it.
    pub surface_size: (u32, u32),
    /// CSS class applied to each generated canvas.
    pub canvas_class: String,
    /// Delay between frames.
    pub frame_interval: Duration,
    /// Period after which `iTime` returns to zero.
    pub time_wrap: Duration,
    /// Colour the surface is cleared to before drawing.
    pub clear_colour: [f32; 4],
}

impl Default for EmbedOptions {
    fn default() -> Self {
        Self {
            surface_size: DEFAULT_SURFACE_SIZE,
            canvas_class: DEFAULT_CANVAS_CLASS.to_string(),
            frame_interval: scheduler::DEFAULT_INTERVAL,
            time_wrap: DEFAULT_TIME_WRAP,
            clear_colour: [0.0, 0.0, 0.0, 1.0],
        }
    }
}

/// Canvas element emitted at an embed point before the document is ready.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Placeholder {
    pub id: InstanceId,
    pub class: String,
    pub width: u32,
    pub height: u32,
}

impl Placeholder {
    pub fn to_markup(&self) -> String {
        format!(
            r#"<canvas id="{}" class="{}" width="{}" height="{}"></canvas>"#,
            escape_attribute(self.id.element_id()),
            escape_attribute(&self.class),
            self.width,
            self.height
        )
    }
}

fn escape_attribute(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '"' => escaped.push_str("&quot;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            other => escaped.push(other),
        }
    }
    escaped
}
