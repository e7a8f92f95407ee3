//! Model views
//!
//! A view is a scoped, typed handle over a node's materialized
//! instance. Callers release a view explicitly via [`ModelView::close`]
//! so projection-specific cleanup runs deterministically; an unreleased
//! view is a leak, never a correctness hazard, under the
//! single-threaded model.

use std::any::Any;
use std::cell::RefCell;
use std::rc::Rc;

use crate::error::{ModelError, ModelResult};
use crate::path::ModelPath;
use crate::types::{ModelElement, ModelType};

pub(crate) type InstanceCell = Rc<RefCell<Box<dyn Any>>>;

/// Scoped, typed handle to a materialized instance
pub struct ModelView {
    path: ModelPath,
    view_type: ModelType,
    instance_type: ModelType,
    instance: InstanceCell,
    writable: bool,
    inputs: Vec<ModelView>,
    on_close: Option<Box<dyn FnOnce()>>,
    closed: bool,
}

impl ModelView {
    pub(crate) fn new(
        path: ModelPath,
        view_type: ModelType,
        instance_type: ModelType,
        instance: InstanceCell,
        writable: bool,
        inputs: Vec<ModelView>,
    ) -> Self {
        Self {
            path,
            view_type,
            instance_type,
            instance,
            writable,
            inputs,
            on_close: None,
            closed: false,
        }
    }

    pub(crate) fn with_on_close(mut self, on_close: impl FnOnce() + 'static) -> Self {
        self.on_close = Some(Box::new(on_close));
        self
    }

    /// Path of the node this view exposes
    pub fn path(&self) -> &ModelPath {
        &self.path
    }

    /// The type this view was requested as
    pub fn view_type(&self) -> &ModelType {
        &self.view_type
    }

    /// The concrete type of the underlying instance
    pub fn instance_type(&self) -> &ModelType {
        &self.instance_type
    }

    pub fn is_writable(&self) -> bool {
        self.writable
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Read the instance as `T`
    pub fn with_ref<T: ModelElement, R>(&self, f: impl FnOnce(&T) -> R) -> ModelResult<R> {
        self.assert_open()?;
        let instance = self.instance.borrow();
        let value = instance
            .downcast_ref::<T>()
            .ok_or_else(|| ModelError::IncompatibleType {
                requested: T::type_name().to_string(),
                expected: self.instance_type.name().to_string(),
            })?;
        Ok(f(value))
    }

    /// Mutate the instance as `T`; fails on a read-only view
    pub fn with_mut<T: ModelElement, R>(&mut self, f: impl FnOnce(&mut T) -> R) -> ModelResult<R> {
        self.assert_open()?;
        if !self.writable {
            return Err(ModelError::NotMutable {
                subject: format!("{} (read-only view as {})", self.path, self.view_type),
            });
        }
        let mut instance = self.instance.borrow_mut();
        let value = instance
            .downcast_mut::<T>()
            .ok_or_else(|| ModelError::IncompatibleType {
                requested: T::type_name().to_string(),
                expected: self.instance_type.name().to_string(),
            })?;
        Ok(f(value))
    }

    /// Release the view, running any projection cleanup and releasing
    /// captured input views. Idempotent; any later read or write fails
    /// with [`ModelError::ViewClosed`].
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        if let Some(on_close) = self.on_close.take() {
            on_close();
        }
        for input in &mut self.inputs {
            input.close();
        }
    }

    fn assert_open(&self) -> ModelResult<()> {
        if self.closed {
            return Err(ModelError::ViewClosed {
                path: self.path.clone(),
                type_name: self.view_type.name().to_string(),
            });
        }
        Ok(())
    }
}

impl std::fmt::Debug for ModelView {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelView")
            .field("path", &self.path)
            .field("view_type", &self.view_type)
            .field("instance_type", &self.instance_type)
            .field("writable", &self.writable)
            .field("closed", &self.closed)
            .finish()
    }
}

/// Mutate-capability of the context a view or collection was produced
/// in. Incidental reads during configuration must never grant
/// accidental mutation rights.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModelViewState {
    can_mutate: bool,
}

impl ModelViewState {
    /// State for a mutate-capable window
    pub fn mutable() -> Self {
        Self { can_mutate: true }
    }

    /// State for read-only access
    pub fn read_only() -> Self {
        Self { can_mutate: false }
    }

    pub fn can_mutate(&self) -> bool {
        self.can_mutate
    }

    pub fn assert_can_mutate(&self, subject: &str) -> ModelResult<()> {
        if !self.can_mutate {
            return Err(ModelError::NotMutable {
                subject: subject.to_string(),
            });
        }
        Ok(())
    }
}
