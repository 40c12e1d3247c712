//! Variable storage for a run: a stack of fixed-size local frames and the
//! lazily evaluated globals.
use crate::error::ExecutionError;
use crate::expression::Value;
use log::trace;
use std::sync::Arc;

/// Parameters passed to a template invocation, by name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParameterSet<'d> {
    entries: Vec<(Arc<str>, Value<'d>)>,
}

impl<'d> ParameterSet<'d> {
    pub fn new() -> Self {
        ParameterSet { entries: Vec::new() }
    }

    /// Sets `name`, replacing an earlier value for the same name.
    pub fn put(&mut self, name: Arc<str>, value: Value<'d>) {
        match self.entries.iter_mut().find(|(n, _)| *n == name) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((name, value)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&Value<'d>> {
        self.entries.iter().find(|(n, _)| &**n == name).map(|(_, v)| v)
    }

    /// Removes and returns `name`.
    pub fn take(&mut self, name: &str) -> Option<Value<'d>> {
        let index = self.entries.iter().position(|(n, _)| &**n == name)?;
        Some(self.entries.swap_remove(index).1)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Where a global variable is in its evaluation.
#[derive(Debug, Clone, PartialEq)]
pub enum GlobalState<'d> {
    Unevaluated,
    /// Evaluation has started and not finished; reaching the variable again
    /// means it depends on itself.
    Evaluating,
    Ready(Value<'d>),
}

#[derive(Debug)]
struct Frame<'d> {
    slots: Vec<Option<Value<'d>>>,
    params: ParameterSet<'d>,
}

#[derive(Debug)]
pub struct Bindery<'d> {
    globals: Vec<GlobalState<'d>>,
    frames: Vec<Frame<'d>>,
    /// Released frames kept for reuse.
    spare: Vec<Frame<'d>>,
    frame_size: usize,
    allocated: usize,
}

impl<'d> Bindery<'d> {
    /// A bindery whose frames all have `frame_size` slots.
    pub fn new(global_count: usize, frame_size: usize) -> Self {
        Bindery {
            globals: vec![GlobalState::Unevaluated; global_count],
            frames: Vec::new(),
            spare: Vec::new(),
            frame_size,
            allocated: 0,
        }
    }

    /// Pushes an empty frame holding the parameters passed by the caller.
    pub fn open_frame(&mut self, params: ParameterSet<'d>) {
        let frame = match self.spare.pop() {
            Some(mut frame) => {
                frame.params = params;
                frame
            }
            None => {
                self.allocated += 1;
                trace!("Allocating frame {} ({} slots)", self.allocated, self.frame_size);
                Frame {
                    slots: vec![None; self.frame_size],
                    params,
                }
            }
        };
        self.frames.push(frame);
    }

    pub fn close_frame(&mut self) {
        if let Some(mut frame) = self.frames.pop() {
            frame.slots.iter_mut().for_each(|slot| *slot = None);
            frame.params = ParameterSet::new();
            self.spare.push(frame);
        }
    }

    /// Empties the current frame in place for the next iteration of a tail
    /// call.
    pub fn reset_frame(&mut self, params: ParameterSet<'d>) {
        match self.frames.last_mut() {
            Some(frame) => {
                frame.slots.iter_mut().for_each(|slot| *slot = None);
                frame.params = params;
            }
            None => self.open_frame(params),
        }
    }

    /// Moves the caller-supplied value of `name` into `slot`. False if the
    /// caller did not pass it.
    pub fn use_parameter(&mut self, name: &str, slot: usize) -> Result<bool, ExecutionError> {
        let frame = self.current_frame()?;
        match frame.params.take(name) {
            Some(value) => {
                store(frame, slot, value)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    pub fn set_local(&mut self, slot: usize, value: Value<'d>) -> Result<(), ExecutionError> {
        store(self.current_frame()?, slot, value)
    }

    pub fn local(&self, slot: usize) -> Result<Value<'d>, ExecutionError> {
        self.frames
            .last()
            .and_then(|frame| frame.slots.get(slot))
            .and_then(|value| value.clone())
            .ok_or_else(|| ExecutionError::type_error(format!("local variable slot {} is not set", slot)))
    }

    pub fn global_state(&self, index: usize) -> Option<&GlobalState<'d>> {
        self.globals.get(index)
    }

    /// Marks global `index` as being evaluated.
    pub fn begin_global(&mut self, index: usize) {
        if let Some(state) = self.globals.get_mut(index) {
            *state = GlobalState::Evaluating;
        }
    }

    pub fn finish_global(&mut self, index: usize, value: Value<'d>) {
        if let Some(state) = self.globals.get_mut(index) {
            *state = GlobalState::Ready(value);
        }
    }

    /// Returns a global whose evaluation failed to the unevaluated state.
    pub fn abandon_global(&mut self, index: usize) {
        if let Some(state) = self.globals.get_mut(index) {
            *state = GlobalState::Unevaluated;
        }
    }

    /// Frames currently on the stack.
    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    /// Frames created so far; released frames are reused, so this is the
    /// deepest the stack has been.
    pub fn allocated_frames(&self) -> usize {
        self.allocated
    }

    fn current_frame(&mut self) -> Result<&mut Frame<'d>, ExecutionError> {
        self.frames
            .last_mut()
            .ok_or_else(|| ExecutionError::type_error("no local frame is open"))
    }
}

fn store<'d>(frame: &mut Frame<'d>, slot: usize, value: Value<'d>) -> Result<(), ExecutionError> {
    match frame.slots.get_mut(slot) {
        Some(target) => {
            *target = Some(value);
            Ok(())
        }
        None => Err(ExecutionError::type_error(format!(
            "local variable slot {} is outside a frame of {}",
            slot,
            frame.slots.len()
        ))),
    }
}
