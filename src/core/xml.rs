//! XML view-description loading
//!
//! The loader is a collaborator of the tree: it only consumes the
//! public mutation API (`create`, `push`, `set_marginal`) plus each
//! class's populate handler. Unknown tags and attributes are hard
//! errors carrying the source line.
//!
//! ```xml
//! <column name="body" color="#202020">
//!     <label text="adapters:"/>
//!     <button name="btn_ok" text="OK!"/>
//!     <scrollbar marginal="right"/>
//! </column>
//! ```

use super::container::MarginalSlot;
use super::control::ClassIndex;
use super::ui::Ui;
use crate::{error, CheapString, Error};
use rgb::RGBA8;
use tinyvec::TinyVec;
use xmlparser::{ElementEnd, StrSpan, Token, Tokenizer};

/// Validated attributes of one XML element, owned so populate handlers
/// can stash the strings. Elements rarely carry more than a handful,
/// so the pairs live inline.
#[derive(Debug, Default)]
pub struct Attributes {
    pairs: TinyVec<[(CheapString, CheapString); 8]>,
}

impl Attributes {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&mut self, name: CheapString, value: CheapString) {
        self.pairs.push((name, value));
    }

    pub fn get(&self, name: &str) -> Option<&CheapString> {
        self.pairs
            .iter()
            .find(|(key, _)| &**key == name)
            .map(|(_, value)| value)
    }

    /// The attribute value; an error naming it when absent.
    pub fn require(&self, name: &str) -> Result<&CheapString, Error> {
        self.get(name).ok_or_else(|| error!("missing attribute {:?}", name))
    }

    /// Parses the attribute as `f32`; `default` when absent.
    pub fn as_f32(&self, name: &str, default: f32) -> Result<f32, Error> {
        match self.get(name) {
            Some(value) => value
                .parse()
                .map_err(|_| error!("attribute {}={:?} is not a number", name, &**value)),
            None => Ok(default),
        }
    }

    /// Parses the attribute as a `#RRGGBB` / `#RRGGBBAA` color.
    pub fn as_color(&self, name: &str) -> Result<Option<RGBA8>, Error> {
        match self.get(name) {
            Some(value) => parse_color(value).map(Some),
            None => Ok(None),
        }
    }
}

/// `#RRGGBB` or `#RRGGBBAA`.
pub fn parse_color(value: &str) -> Result<RGBA8, Error> {
    let hex = value
        .strip_prefix('#')
        .ok_or_else(|| error!("color {:?} does not start with '#'", value))?;
    if hex.len() != 6 && hex.len() != 8 {
        return Err(error!("color {:?} is not #RRGGBB or #RRGGBBAA", value));
    }
    let byte = |range: std::ops::Range<usize>| {
        u8::from_str_radix(&hex[range], 16).map_err(|_| error!("color {:?} has invalid hex", value))
    };
    Ok(RGBA8::new(
        byte(0..2)?,
        byte(2..4)?,
        byte(4..6)?,
        match hex.len() == 8 {
            true => byte(6..8)?,
            false => 255,
        },
    ))
}

fn parse_marginal(value: &str) -> Result<MarginalSlot, Error> {
    Ok(match value {
        "left" => MarginalSlot::Left,
        "top" => MarginalSlot::Top,
        "right" => MarginalSlot::Right,
        "bottom" => MarginalSlot::Bottom,
        _ => return Err(error!("unknown marginal slot {:?}", value)),
    })
}

struct PendingElement {
    key: super::arena::ControlKey,
    class: ClassIndex,
    parent: super::arena::ControlKey,
    attributes: Attributes,
    marginal: Option<MarginalSlot>,
}

/// Builds the view described by `source` under the context's root
/// container.
pub fn load_view(ui: &mut Ui, source: &str) -> Result<(), Error> {
    let line = |span: StrSpan| source[..span.start()].matches('\n').count() + 1;

    let mut stack = vec![ui.root];
    let mut pending: Option<PendingElement> = None;

    for token in Tokenizer::from(source) {
        let token = token.map_err(|e| error!("XML token error: {:?}", e))?;

        match token {
            Token::ElementStart { prefix, local, span } => {
                if !prefix.as_str().is_empty() {
                    return Err(error!(
                        "unexpected prefix {:?} (line {})", prefix.as_str(), line(span)
                    ));
                }
                let tag = local.as_str();
                let class = ui.class_for_tag(tag).ok_or_else(|| {
                    error!("unknown XML tag {:?} (line {})", tag, line(span))
                })?;

                let parent = *stack.last().unwrap();
                let key = match ui.classes[usize::from(class)].accepts_children {
                    true => ui.tree.create_container(class),
                    false => ui.tree.create(class),
                };
                pending = Some(PendingElement {
                    key,
                    class,
                    parent,
                    attributes: Attributes::new(),
                    marginal: None,
                });
            },

            Token::Attribute { prefix, local, value, span } => {
                if !prefix.as_str().is_empty() {
                    return Err(error!(
                        "unexpected prefix {:?} (line {})", prefix.as_str(), line(span)
                    ));
                }
                let element = pending
                    .as_mut()
                    .ok_or_else(|| error!("attribute outside an element (line {})", line(span)))?;
                let name = local.as_str();

                match name {
                    "name" => {
                        ui.tree[element.key].name = Some(String::from(value.as_str()).into());
                    },
                    "marginal" => element.marginal = Some(parse_marginal(value.as_str())?),
                    _ => {
                        let accepted = ui.classes[usize::from(element.class)].xml_attributes;
                        if !accepted.contains(&name) {
                            return Err(error!(
                                "unknown attribute {:?} (line {})", name, line(span)
                            ));
                        }
                        element.attributes.push(
                            String::from(name).into(),
                            String::from(value.as_str()).into(),
                        );
                    },
                }
            },

            Token::ElementEnd { end, span } => match end {
                ElementEnd::Open => {
                    let element = pending
                        .take()
                        .ok_or_else(|| error!("stray '>' (line {})", line(span)))?;
                    if !ui.classes[usize::from(element.class)].accepts_children {
                        return Err(error!(
                            "{} does not accept children (line {})",
                            ui.classes[usize::from(element.class)].name,
                            line(span),
                        ));
                    }
                    let key = element.key;
                    attach(ui, element)?;
                    stack.push(key);
                },
                ElementEnd::Empty => {
                    let element = pending
                        .take()
                        .ok_or_else(|| error!("stray '/>' (line {})", line(span)))?;
                    attach(ui, element)?;
                },
                ElementEnd::Close(prefix, local) => {
                    if !prefix.as_str().is_empty() {
                        return Err(error!(
                            "unexpected prefix {:?} (line {})", prefix.as_str(), line(span)
                        ));
                    }
                    if stack.len() <= 1 {
                        return Err(error!(
                            "unbalanced close tag {:?} (line {})", local.as_str(), line(span)
                        ));
                    }
                    stack.pop();
                },
            },

            Token::Text { text } => {
                if !text.as_str().trim().is_empty() {
                    return Err(error!(
                        "unexpected text {:?} (line {})", text.as_str().trim(), line(text)
                    ));
                }
            },

            Token::Declaration { .. } | Token::Comment { .. } => (),

            _ => return Err(error!("unsupported XML construct")),
        }
    }

    match stack.len() == 1 {
        true => Ok(()),
        false => Err(error!("{} unclosed element(s)", stack.len() - 1)),
    }
}

/// Links the element into the tree and runs its populate handler.
/// List children attach before populate (handlers may inspect the
/// parent); marginal controls populate first so their thickness is
/// known when the slot geometry is derived.
fn attach(ui: &mut Ui, element: PendingElement) -> Result<(), Error> {
    let handlers = ui.classes[usize::from(element.class)].handlers;

    match element.marginal {
        None => {
            ui.tree.push(element.parent, element.key);
            (handlers.populate)(ui, element.class, element.key, &element.attributes)?;
        },
        Some(slot) => {
            (handlers.populate)(ui, element.class, element.key, &element.attributes)?;
            ui.set_marginal(element.parent, slot, element.key);
        },
    }
    ui.mark_device_current(element.key);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::device::HeadlessDevice;
    use crate::core::visual::Size;

    fn loaded_ui(source: &str) -> Result<Ui, Error> {
        let mut ui = Ui::new(Box::new(HeadlessDevice::new()));
        ui.set_root_size(Size::new(640.0, 480.0));
        ui.load_xml(source)?;
        Ok(ui)
    }

    #[test]
    fn loads_nested_controls_in_document_order() {
        let ui = loaded_ui(
            r#"<column name="body">
                <label text="one"/>
                <label text="two"/>
                <row name="actions">
                    <button name="btn_ok" text="OK!"/>
                </row>
            </column>"#,
        )
        .unwrap();

        let body = ui.find_control("body").unwrap();
        assert_eq!(ui.tree.count(body), 3);
        let actions = ui.find_control("actions").unwrap();
        assert_eq!(ui.tree.parent(actions), Some(body));
        let button = ui.find_control("btn_ok").unwrap();
        assert_eq!(ui.tree.parent(button), Some(actions));
    }

    #[test]
    fn marginal_attribute_fills_a_slot_not_the_list() {
        let ui = loaded_ui(
            r#"<column name="body">
                <label text="content"/>
                <scrollbar marginal="right"/>
            </column>"#,
        )
        .unwrap();

        let body = ui.find_control("body").unwrap();
        assert_eq!(ui.tree.count(body), 1);
        let bar = ui.tree.marginal(body, MarginalSlot::Right).unwrap();
        assert!(ui.tree[bar].flags.contains(crate::core::control::ControlFlags::MARGINAL));
    }

    #[test]
    fn unknown_tags_and_attributes_are_positioned_errors() {
        let err = loaded_ui("<blink/>").unwrap_err();
        assert!(err.msg.as_deref().unwrap().contains("blink"));

        let err = loaded_ui("<column>\n<label text=\"x\" explode=\"now\"/>\n</column>").unwrap_err();
        let msg = err.msg.as_deref().unwrap();
        assert!(msg.contains("explode") && msg.contains("line 2"));
    }

    #[test]
    fn colors_parse_in_both_hex_widths() {
        assert_eq!(parse_color("#102030").unwrap(), RGBA8::new(16, 32, 48, 255));
        assert_eq!(parse_color("#10203040").unwrap(), RGBA8::new(16, 32, 48, 64));
        assert!(parse_color("102030").is_err());
        assert!(parse_color("#1020").is_err());
    }
}
