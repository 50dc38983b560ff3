//! Typed description of the relay graph.
//!
//! The engine consumes gst-launch syntax, so the graph is assembled from typed
//! stages and rendered to text in one place. Rendering is pure and has no
//! engine dependency.
//!
//! ```text
//! rtspsrc ! rtph264depay ! h264parse ! avdec_h264 ! videoconvert ! videoscale
//!   ! video/x-raw,format=..,width=..,height=.. ! queue (1, leaky) !
//!     single: <network sink>
//!     tee:    tee name=t
//!               t. ! queue (1, leaky) ! <network sink>
//!               t. ! queue (1, leaky) ! appsink name=drain
//! ```

use std::fmt;

use crate::config::{RelayConfig, Topology, Transport};

/// Name of the application endpoint the drain thread pulls from.
pub const DRAIN_SINK_NAME: &str = "drain";
const TEE_NAME: &str = "t";

/// An element factory with its properties, in launch order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Element {
    factory: &'static str,
    properties: Vec<(&'static str, String)>,
}

impl Element {
    pub fn new(factory: &'static str) -> Self {
        Self {
            factory,
            properties: Vec::new(),
        }
    }

    pub fn prop(mut self, key: &'static str, value: impl ToString) -> Self {
        self.properties.push((key, value.to_string()));
        self
    }
}

/// A caps filter such as `video/x-raw,format=RGB16`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Caps {
    media_type: &'static str,
    fields: Vec<(&'static str, String)>,
}

impl Caps {
    pub fn new(media_type: &'static str) -> Self {
        Self {
            media_type,
            fields: Vec::new(),
        }
    }

    pub fn field(mut self, key: &'static str, value: impl ToString) -> Self {
        self.fields.push((key, value.to_string()));
        self
    }
}

/// One node of the graph.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Stage {
    Element(Element),
    Caps(Caps),
}

impl From<Element> for Stage {
    fn from(element: Element) -> Self {
        Stage::Element(element)
    }
}

impl From<Caps> for Stage {
    fn from(caps: Caps) -> Self {
        Stage::Caps(caps)
    }
}

impl Stage {
    pub fn factory(&self) -> Option<&'static str> {
        match self {
            Stage::Element(element) => Some(element.factory),
            Stage::Caps(_) => None,
        }
    }

    pub fn property(&self, key: &str) -> Option<&str> {
        match self {
            Stage::Element(element) => element
                .properties
                .iter()
                .find(|(k, _)| *k == key)
                .map(|(_, v)| v.as_str()),
            Stage::Caps(_) => None,
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Element(element) => {
                f.write_str(element.factory)?;
                for (key, value) in &element.properties {
                    write!(f, " {}={}", key, quote_value(value))?;
                }
                Ok(())
            }
            Stage::Caps(caps) => {
                f.write_str(caps.media_type)?;
                for (key, value) in &caps.fields {
                    write!(f, ",{}={}", key, quote_caps_value(value))?;
                }
                Ok(())
            }
        }
    }
}

/// Quote a property value if the launch parser would otherwise split it.
fn quote_value(value: &str) -> String {
    quote_if(value, |c| {
        c.is_whitespace() || matches!(c, '"' | '\'' | '!' | '\\')
    })
}

/// Caps fields also end at `,` and `;`, so those force quoting too.
fn quote_caps_value(value: &str) -> String {
    quote_if(value, |c| {
        c.is_whitespace() || matches!(c, '"' | '\'' | '!' | '\\' | ',' | ';' | '=')
    })
}

fn quote_if(value: &str, splits: impl Fn(char) -> bool) -> String {
    if !value.is_empty() && !value.chars().any(splits) {
        return value.to_string();
    }
    let mut quoted = String::with_capacity(value.len() + 2);
    quoted.push('"');
    for c in value.chars() {
        if matches!(c, '"' | '\\') {
            quoted.push('\\');
        }
        quoted.push(c);
    }
    quoted.push('"');
    quoted
}

#[derive(Clone, Debug, PartialEq, Eq)]
enum Tail {
    Single(Vec<Stage>),
    Tee(Vec<Vec<Stage>>),
}

/// The full processing graph, ready to render.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PipelineGraph {
    trunk: Vec<Stage>,
    tail: Tail,
}

impl PipelineGraph {
    pub fn from_config(config: &RelayConfig, stream_url: &str) -> Self {
        let mut trunk: Vec<Stage> = vec![
            Element::new("rtspsrc")
                .prop("location", stream_url)
                .prop("latency", config.latency_ms)
                .into(),
            Element::new("rtph264depay").into(),
            Element::new("h264parse").into(),
            Element::new("avdec_h264").into(),
            Element::new("videoconvert").into(),
            Element::new("videoscale").into(),
            Caps::new("video/x-raw")
                .field("format", &config.video.format)
                .field("width", config.video.width)
                .field("height", config.video.height)
                .into(),
            leaky_queue(),
        ];

        let tail = match config.topology {
            Topology::Single => Tail::Single(vec![network_sink(config)]),
            Topology::Tee => {
                trunk.push(Element::new("tee").prop("name", TEE_NAME).into());
                Tail::Tee(vec![
                    vec![leaky_queue(), network_sink(config)],
                    vec![leaky_queue(), drain_sink()],
                ])
            }
        };

        Self { trunk, tail }
    }

    pub fn topology(&self) -> Topology {
        match self.tail {
            Tail::Single(_) => Topology::Single,
            Tail::Tee(_) => Topology::Tee,
        }
    }

    /// Name of the application endpoint, if the graph has one.
    pub fn drain_endpoint(&self) -> Option<&'static str> {
        match self.tail {
            Tail::Single(_) => None,
            Tail::Tee(_) => Some(DRAIN_SINK_NAME),
        }
    }

    /// The stage that ships frames onto the network.
    pub fn network_sink(&self) -> Option<&Stage> {
        let stages = match &self.tail {
            Tail::Single(stages) => stages,
            Tail::Tee(branches) => branches.first()?,
        };
        stages.last()
    }

    /// Render to gst-launch syntax.
    pub fn render(&self) -> String {
        let mut out = join_stages(&self.trunk);
        match &self.tail {
            Tail::Single(stages) => {
                out.push_str(" ! ");
                out.push_str(&join_stages(stages));
            }
            Tail::Tee(branches) => {
                for branch in branches {
                    out.push_str(&format!(" {}. ! {}", TEE_NAME, join_stages(branch)));
                }
            }
        }
        out
    }
}

fn join_stages(stages: &[Stage]) -> String {
    stages
        .iter()
        .map(|stage| stage.to_string())
        .collect::<Vec<_>>()
        .join(" ! ")
}

fn leaky_queue() -> Stage {
    Element::new("queue")
        .prop("max-size-buffers", 1)
        .prop("leaky", "downstream")
        .into()
}

fn network_sink(config: &RelayConfig) -> Stage {
    let factory = match config.transport {
        Transport::Udp => "udpsink",
        Transport::Tcp => "tcpserversink",
    };
    Element::new(factory)
        .prop("host", &config.out_ip)
        .prop("port", config.out_port)
        .prop("sync", false)
        .into()
}

fn drain_sink() -> Stage {
    Element::new("appsink")
        .prop("name", DRAIN_SINK_NAME)
        .prop("sync", false)
        .prop("emit-signals", false)
        .prop("max-buffers", 1)
        .prop("drop", true)
        .into()
}

/// Build and render the description for `config`.
pub fn describe(config: &RelayConfig, stream_url: &str) -> String {
    PipelineGraph::from_config(config, stream_url).render()
}
