//! Cursive controls implementing [`WidgetBinding`].
//!
//! Each control keeps a shadow of its visible state that the view callbacks update, so
//! [`WidgetBinding::read_value`] never needs the `Cursive` root. Store writes reach the views
//! through the callback sink and are applied on the next event loop turn.

use std::sync::{
    Arc, Mutex, PoisonError,
    atomic::{AtomicBool, Ordering},
};

use cursive::{
    CbSink, Cursive,
    traits::{Nameable, Resizable},
    view::View,
    views::{
        Button, Checkbox, EditView, EnableableView, LinearLayout, NamedView, RadioButton,
        RadioGroup, SelectView, SliderView, TextView,
    },
};
use serde_json::{Map, Value, json};

use crate::{
    binding::WidgetBinding,
    data::{
        spec::{ControlKind, InputType, ParameterSpec, ValueRange},
        value::ParamValue,
    },
    ui::commit,
};

/// Visible state shared between a control and its view callbacks.
#[derive(Clone)]
pub(crate) struct Shadow {
    raw: Arc<Mutex<Value>>,
    editable: Arc<AtomicBool>,
}

impl Shadow {
    fn new(raw: Value) -> Self {
        Self {
            raw: Arc::new(Mutex::new(raw)),
            editable: Arc::new(AtomicBool::new(true)),
        }
    }

    fn get(&self) -> Value {
        self.raw
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn set(&self, value: Value) {
        *self.raw.lock().unwrap_or_else(PoisonError::into_inner) = value;
    }

    fn editable(&self) -> bool {
        self.editable.load(Ordering::Acquire)
    }

    fn set_editable(&self, editable: bool) {
        self.editable.store(editable, Ordering::Release);
    }
}

fn send(sink: &CbSink, f: impl FnOnce(&mut Cursive) + Send + 'static) {
    if sink.send(Box::new(f)).is_err() {
        warn!("cursive event loop is gone, view update dropped");
    }
}

/// View id of a parameter's control.
pub fn view_name(param: &str) -> String {
    format!("maskconf.{param}")
}

fn part_name(param: &str, idx: usize) -> String {
    format!("maskconf.{param}#{idx}")
}

/// Position of a value among enumerated labels.
fn choice_index(choices: &[String], value: &ParamValue) -> Option<usize> {
    match value {
        ParamValue::Integer(idx) => usize::try_from(*idx).ok().filter(|i| *i < choices.len()),
        ParamValue::Text(s) => choices.iter().position(|c| c == s),
        _ => None,
    }
}

/// Text entry, used for entry fields and spinners.
pub struct EntryWidget {
    name: String,
    choices: Vec<String>,
    shadow: Shadow,
    sink: CbSink,
}

impl EntryWidget {
    /// Create the control and its view.
    pub fn new(spec: &ParameterSpec, sink: CbSink) -> (Self, Box<dyn View>) {
        let name = view_name(&spec.name);
        let choices = spec.value_range.choices().unwrap_or_default().to_vec();
        let text = entry_text(&choices, &spec.initial_value);
        let shadow = Shadow::new(Value::String(text.clone()));

        let edit = {
            let on_edit = shadow.clone();
            let param = spec.name.clone();
            EditView::new()
                .content(text)
                .on_edit(move |_, text, _| on_edit.set(Value::String(text.to_string())))
                .on_submit(move |s, _| commit(s, &param))
                .with_name(name.clone())
                .fixed_width(usize::from(spec.width))
        };

        let view: Box<dyn View> = if spec.preferred_control == ControlKind::Spinner {
            Box::new(
                LinearLayout::horizontal()
                    .child(step_button(spec, &shadow, -1.0))
                    .child(edit)
                    .child(step_button(spec, &shadow, 1.0)),
            )
        } else {
            Box::new(edit)
        };

        (
            Self {
                name,
                choices,
                shadow,
                sink,
            },
            view,
        )
    }
}

/// Enumerated integers are edited by label.
fn entry_text(choices: &[String], value: &ParamValue) -> String {
    match value {
        ParamValue::Integer(_) => choice_index(choices, value)
            .map(|idx| choices[idx].clone())
            .unwrap_or_else(|| value.to_string()),
        _ => value.to_string(),
    }
}

fn step_button(spec: &ParameterSpec, shadow: &Shadow, direction: f64) -> Button {
    let label = if direction < 0.0 { "<" } else { ">" };
    let range = spec.value_range.clone();
    let input_type = spec.input_type;
    let shadow = shadow.clone();
    let param = spec.name.clone();
    Button::new_raw(label, move |s| {
        if !shadow.editable() {
            return;
        }
        if let Some(next) = stepped(input_type, &range, &shadow.get(), direction) {
            shadow.set(next);
            commit(s, &param);
        }
    })
}

/// Value one step away from `raw`, clamped to the range.
fn stepped(input_type: InputType, range: &ValueRange, raw: &Value, direction: f64) -> Option<Value> {
    let text = match raw {
        Value::String(s) => s.trim().to_string(),
        other => other.to_string(),
    };
    if let Some(choices) = range.choices() {
        let current = choices.iter().position(|c| *c == text).unwrap_or(0);
        let next = if direction < 0.0 {
            current.saturating_sub(1)
        } else {
            (current + 1).min(choices.len() - 1)
        };
        return Some(Value::String(choices[next].clone()));
    }

    let (min, max) = range.bounds()?;
    let step = range.step().unwrap_or(1.0);
    let last = min + ((max - min) / step).floor() * step;
    let current = text.parse::<f64>().unwrap_or(min);
    let on_grid = min + ((current - min) / step).round() * step;
    let next = (on_grid + direction * step).clamp(min, last);
    Some(match input_type {
        InputType::Integer => json!(next.round() as i64),
        _ => json!(next),
    })
}

impl WidgetBinding for EntryWidget {
    fn display_value(&mut self, value: &ParamValue) {
        let text = entry_text(&self.choices, value);
        self.shadow.set(Value::String(text.clone()));
        let name = self.name.clone();
        send(&self.sink, move |s| {
            s.call_on_name(&name, |v: &mut EditView| {
                let _ = v.set_content(text);
            });
        });
    }

    fn read_value(&self) -> Value {
        self.shadow.get()
    }

    fn set_editable(&mut self, editable: bool) {
        self.shadow.set_editable(editable);
        let name = self.name.clone();
        send(&self.sink, move |s| {
            s.call_on_name(&name, |v: &mut EditView| v.set_enabled(editable));
        });
    }

    fn set_attributes(&mut self, attributes: &Map<String, Value>) {
        if let Some(secret) = attributes.get("secret").and_then(Value::as_bool) {
            let name = self.name.clone();
            send(&self.sink, move |s| {
                s.call_on_name(&name, |v: &mut EditView| v.set_secret(secret));
            });
        }
    }
}

/// Popup list box over enumerated values.
pub struct ListWidget {
    name: String,
    choices: Vec<String>,
    shadow: Shadow,
    sink: CbSink,
}

impl ListWidget {
    pub fn new(spec: &ParameterSpec, sink: CbSink) -> (Self, Box<dyn View>) {
        let name = view_name(&spec.name);
        let choices = spec.value_range.choices().unwrap_or_default().to_vec();
        let initial = choice_index(&choices, &spec.initial_value).unwrap_or(0);
        let shadow = Shadow::new(json!(choices.get(initial)));

        let mut select = SelectView::<usize>::new().popup();
        for (idx, label) in choices.iter().enumerate() {
            select.add_item(label.clone(), idx);
        }
        let _ = select.set_selection(initial);

        let on_submit = shadow.clone();
        let labels = choices.clone();
        let param = spec.name.clone();
        let view = select
            .on_submit(move |s, idx: &usize| {
                if !on_submit.editable() {
                    return;
                }
                on_submit.set(json!(labels.get(*idx)));
                commit(s, &param);
            })
            .with_name(name.clone())
            .min_width(usize::from(spec.width));

        (
            Self {
                name,
                choices,
                shadow,
                sink,
            },
            Box::new(view),
        )
    }
}

impl WidgetBinding for ListWidget {
    fn display_value(&mut self, value: &ParamValue) {
        let Some(idx) = choice_index(&self.choices, value) else {
            return;
        };
        self.shadow.set(json!(self.choices[idx]));
        let name = self.name.clone();
        send(&self.sink, move |s| {
            s.call_on_name(&name, |v: &mut SelectView<usize>| {
                let _ = v.set_selection(idx);
            });
        });
    }

    fn read_value(&self) -> Value {
        self.shadow.get()
    }

    fn set_editable(&mut self, editable: bool) {
        self.shadow.set_editable(editable);
        let name = self.name.clone();
        send(&self.sink, move |s| {
            s.call_on_name(&name, |v: &mut SelectView<usize>| v.set_enabled(editable));
        });
    }

    fn set_attributes(&mut self, _attributes: &Map<String, Value>) {}
}

/// Radio buttons over enumerated values.
pub struct RadioWidget {
    param: String,
    choices: Vec<String>,
    shadow: Shadow,
    sink: CbSink,
}

impl RadioWidget {
    pub fn new(spec: &ParameterSpec, sink: CbSink) -> (Self, Box<dyn View>) {
        let choices = spec.value_range.choices().unwrap_or_default().to_vec();
        let initial = choice_index(&choices, &spec.initial_value).unwrap_or(0);
        let shadow = Shadow::new(json!(choices.get(initial)));

        let mut group: RadioGroup<usize> = RadioGroup::new();
        let on_change = shadow.clone();
        let labels = choices.clone();
        let param = spec.name.clone();
        group.set_on_change(move |s, idx: &usize| {
            on_change.set(json!(labels.get(*idx)));
            commit(s, &param);
        });

        let mut layout = LinearLayout::vertical();
        for (idx, label) in choices.iter().enumerate() {
            let button = group.button(idx, label.clone());
            let button = if idx == initial {
                button.selected()
            } else {
                button
            };
            layout.add_child(button.with_name(part_name(&spec.name, idx)));
        }

        (
            Self {
                param: spec.name.clone(),
                choices,
                shadow,
                sink,
            },
            Box::new(layout),
        )
    }

    fn for_each_button(&self, f: impl Fn(&mut RadioButton<usize>, usize) + Send + Clone + 'static) {
        let names: Vec<_> = (0..self.choices.len())
            .map(|idx| part_name(&self.param, idx))
            .collect();
        send(&self.sink, move |s| {
            for (idx, name) in names.iter().enumerate() {
                let f = f.clone();
                s.call_on_name(name, move |b: &mut RadioButton<usize>| f(b, idx));
            }
        });
    }
}

impl WidgetBinding for RadioWidget {
    fn display_value(&mut self, value: &ParamValue) {
        let Some(selected) = choice_index(&self.choices, value) else {
            return;
        };
        self.shadow.set(json!(self.choices[selected]));
        self.for_each_button(move |button, idx| {
            if idx == selected {
                let _ = button.select();
            }
        });
    }

    fn read_value(&self) -> Value {
        self.shadow.get()
    }

    fn set_editable(&mut self, editable: bool) {
        self.shadow.set_editable(editable);
        self.for_each_button(move |button, _| button.set_enabled(editable));
    }

    fn set_attributes(&mut self, _attributes: &Map<String, Value>) {}
}

/// One checkbox per declared flag.
pub struct FlagsWidget {
    param: String,
    flags: Vec<(String, u64)>,
    shadow: Shadow,
    sink: CbSink,
}

impl FlagsWidget {
    pub fn new(spec: &ParameterSpec, sink: CbSink) -> (Self, Box<dyn View>) {
        let flags = spec.value_range.flags().unwrap_or_default().to_vec();
        let initial = spec.initial_value.as_flags().unwrap_or(0);
        let shadow = Shadow::new(json!(initial));

        let mut layout = LinearLayout::vertical();
        for (idx, (flag, mask)) in flags.iter().enumerate() {
            let mask = *mask;
            let on_change = shadow.clone();
            let param = spec.name.clone();
            let checkbox = Checkbox::new()
                .with_checked(initial & mask == mask)
                .on_change(move |s, checked| {
                    let current = on_change.get().as_u64().unwrap_or(0);
                    let next = if checked {
                        current | mask
                    } else {
                        current & !mask
                    };
                    on_change.set(json!(next));
                    commit(s, &param);
                })
                .with_name(part_name(&spec.name, idx));
            layout.add_child(
                LinearLayout::horizontal()
                    .child(checkbox)
                    .child(TextView::new(format!(" {flag}"))),
            );
        }

        (
            Self {
                param: spec.name.clone(),
                flags,
                shadow,
                sink,
            },
            Box::new(layout),
        )
    }
}

impl WidgetBinding for FlagsWidget {
    fn display_value(&mut self, value: &ParamValue) {
        let Some(bits) = value.as_flags() else {
            return;
        };
        self.shadow.set(json!(bits));
        let states: Vec<_> = self
            .flags
            .iter()
            .enumerate()
            .map(|(idx, (_, mask))| (part_name(&self.param, idx), bits & mask == *mask))
            .collect();
        send(&self.sink, move |s| {
            for (name, checked) in states {
                s.call_on_name(&name, |c: &mut Checkbox| {
                    let _ = c.set_checked(checked);
                });
            }
        });
    }

    fn read_value(&self) -> Value {
        self.shadow.get()
    }

    fn set_editable(&mut self, editable: bool) {
        self.shadow.set_editable(editable);
        let names: Vec<_> = (0..self.flags.len())
            .map(|idx| part_name(&self.param, idx))
            .collect();
        send(&self.sink, move |s| {
            for name in names {
                s.call_on_name(&name, |c: &mut Checkbox| c.set_enabled(editable));
            }
        });
    }

    fn set_attributes(&mut self, _attributes: &Map<String, Value>) {}
}

/// Horizontal slider over a stepped numeric range.
pub struct SliderWidget {
    name: String,
    toggle: String,
    min: f64,
    step: f64,
    shadow: Shadow,
    sink: CbSink,
}

impl SliderWidget {
    pub fn new(spec: &ParameterSpec, sink: CbSink) -> (Self, Box<dyn View>) {
        let name = view_name(&spec.name);
        let (min, max) = spec.value_range.bounds().unwrap_or((0.0, 0.0));
        let step = spec.value_range.step().unwrap_or(1.0);
        let positions = (((max - min) / step).floor() as usize).saturating_add(1);
        let initial = spec.initial_value.as_f64().unwrap_or(min);
        let shadow = Shadow::new(json!(initial));

        let on_change = shadow.clone();
        let param = spec.name.clone();
        let input_type = spec.input_type;
        let view = SliderView::horizontal(positions)
            .value(position(min, step, initial))
            .on_change(move |s, pos| {
                if !on_change.editable() {
                    return;
                }
                let value = min + pos as f64 * step;
                on_change.set(match input_type {
                    InputType::Integer => json!(value.round() as i64),
                    _ => json!(value),
                });
                commit(s, &param);
            })
            .with_name(name.clone());
        let toggle = format!("{name}.toggle");
        let view = EnableableView::new(view)
            .with_enabled(!spec.read_only)
            .with_name(toggle.clone());

        (
            Self {
                name,
                toggle,
                min,
                step,
                shadow,
                sink,
            },
            Box::new(view),
        )
    }
}

fn position(min: f64, step: f64, value: f64) -> usize {
    ((value - min) / step).round().max(0.0) as usize
}

impl WidgetBinding for SliderWidget {
    fn display_value(&mut self, value: &ParamValue) {
        let Some(v) = value.as_f64() else {
            return;
        };
        self.shadow.set(value.as_json());
        let pos = position(self.min, self.step, v);
        let name = self.name.clone();
        send(&self.sink, move |s| {
            s.call_on_name(&name, |slider: &mut SliderView| {
                let _ = slider.set_value(pos);
            });
        });
    }

    fn read_value(&self) -> Value {
        self.shadow.get()
    }

    fn set_editable(&mut self, editable: bool) {
        self.shadow.set_editable(editable);
        let toggle = self.toggle.clone();
        send(&self.sink, move |s| {
            s.call_on_name(&toggle, |v: &mut EnableableView<NamedView<SliderView>>| {
                v.set_enabled(editable)
            });
        });
    }

    fn set_attributes(&mut self, _attributes: &Map<String, Value>) {}
}
