//! Context bindings and the element registry
//!
//! A [`Context`] is a process-local binding to one control root. There is at
//! most one live binding per distinct root; binding the same root again
//! hands out another handle to it. Dropping the last handle tears down every
//! element the process still has registered under that root, best-effort.
//!
//! # Thread safety
//!
//! Registry operations on a bound context are internally synchronized. The
//! bind/unbind pair itself serializes through the process-wide registry
//! lock, but callers should not rely on the relative ordering of racing
//! bind/unbind calls for the same root: a rebind that races the teardown of
//! the previous binding may observe either the old or a fresh context.
use crate::{
    element::{Element, ElementInner},
    error::{ElementError, Result},
    name::{self, Xoshiro128StarStar},
    setup::{GpioDir, SetupConfig},
    sysfs::{self, ControlFile},
    types::{Activity, Pin, PinPull},
    util::{DEFAULT_ROOT, MAX_ROOT_LEN},
};
use log::warn;
use std::{
    collections::BTreeMap,
    io::{Seek, SeekFrom},
    path::{Path, PathBuf},
    sync::{Arc, Mutex, PoisonError, Weak},
};

/// Process-wide list of live bindings, keyed by root path.
static CONTEXTS: Mutex<Vec<(PathBuf, Weak<Binding>)>> = Mutex::new(Vec::new());

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Whether [`Context::setup`] created the element or found it already
/// present.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetupStatus {
    /// A fresh element was requested from the driver.
    Created,

    /// The name was already claimed, either by this process (the returned
    /// handle shares the existing registration) or on the driver side.
    Existed,
}

pub(crate) struct State {
    rng: Xoshiro128StarStar,
    elements: BTreeMap<String, Weak<ElementInner>>,
}

pub(crate) struct ContextInner {
    root: PathBuf,
    state: Mutex<State>,
}

impl ContextInner {
    pub(crate) fn root(&self) -> &Path {
        &self.root
    }

    fn write_unsetup(&self, element_name: &str) -> Result<()> {
        let mut file = sysfs::open_control(&self.root, ControlFile::Unsetup)?;
        sysfs::write_request(&mut file, element_name)?;
        Ok(())
    }

    /// Drops the registry record for `element_name` and issues the unsetup
    /// request. Called from the last element handle's drop.
    ///
    /// The record is matched by identity: if it has already been removed
    /// (bulk teardown) or replaced by a newer element of the same name,
    /// nothing is written, so teardown happens at most once per
    /// registration.
    pub(crate) fn release_element(&self, element_name: &str, inner: *const ElementInner) {
        let mut state = lock(&self.state);
        match state.elements.get(element_name) {
            Some(weak) if weak.as_ptr() == inner => {
                state.elements.remove(element_name);
            }
            _ => return,
        }
        if let Err(e) = self.write_unsetup(element_name) {
            warn!("unsetup of element `{}` failed: {}", element_name, e);
        }
    }

    /// Best-effort bulk teardown of every still-registered element, writing
    /// all names through a single unsetup descriptor. Failures are logged
    /// and the loop continues; the in-process records are dropped
    /// regardless.
    fn teardown_all(&self) {
        let mut state = lock(&self.state);
        if state.elements.is_empty() {
            return;
        }
        let mut file = match sysfs::open_control(&self.root, ControlFile::Unsetup) {
            Ok(file) => Some(file),
            Err(e) => {
                warn!("bulk unsetup under {} failed: {}", self.root.display(), e);
                None
            }
        };
        for (element_name, _) in std::mem::take(&mut state.elements) {
            let Some(file) = file.as_mut() else { continue };
            let res = file
                .seek(SeekFrom::Start(0))
                .and_then(|_| sysfs::write_request(file, &element_name));
            if let Err(e) = res {
                warn!("unsetup of element `{}` failed: {}", element_name, e);
            }
        }
    }
}

struct Binding {
    inner: Arc<ContextInner>,
}

impl Drop for Binding {
    fn drop(&mut self) {
        let mut contexts = lock(&CONTEXTS);
        contexts.retain(|(_, weak)| weak.strong_count() > 0);
        drop(contexts);
        self.inner.teardown_all();
    }
}

/// A refcounted handle to a control-root binding.
///
/// Cloning is cheap and shares the binding; the binding (and with it every
/// element this process still has registered) is torn down when the last
/// handle is dropped.
#[derive(Clone)]
pub struct Context {
    binding: Arc<Binding>,
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("root", &self.binding.inner.root)
            .finish()
    }
}

fn validate_root(root: &Path) -> Result<()> {
    let Some(s) = root.to_str() else {
        return Err(ElementError::InvalidRoot(root.display().to_string()));
    };
    if s.is_empty() || !s.starts_with('/') || s.len() > MAX_ROOT_LEN {
        return Err(ElementError::InvalidRoot(s.into()));
    }
    Ok(())
}

impl Context {
    /// Binds the default control root, `/sys/pisound-micro`.
    ///
    /// # Errors
    ///
    /// If OS entropy cannot be read for the context's name-generator seed.
    pub fn bind() -> Result<Context> {
        Self::bind_at(DEFAULT_ROOT)
    }

    /// Binds an explicit control root. Mainly for tests and maintenance
    /// tooling; regular callers want [`Context::bind`].
    ///
    /// The root must be an absolute path of at most 64 bytes.
    pub fn bind_at<P: AsRef<Path>>(root: P) -> Result<Context> {
        let root = root.as_ref();
        validate_root(root)?;

        let mut contexts = lock(&CONTEXTS);
        if let Some(binding) = contexts
            .iter()
            .find(|(p, _)| p == root)
            .and_then(|(_, weak)| weak.upgrade())
        {
            return Ok(Context { binding });
        }

        let rng = Xoshiro128StarStar::from_entropy()?;
        let binding = Arc::new(Binding {
            inner: Arc::new(ContextInner {
                root: root.to_path_buf(),
                state: Mutex::new(State {
                    rng,
                    elements: BTreeMap::new(),
                }),
            }),
        });
        contexts.retain(|(_, weak)| weak.strong_count() > 0);
        contexts.push((root.to_path_buf(), Arc::downgrade(&binding)));
        Ok(Context { binding })
    }

    /// The control root this context is bound to.
    pub fn root(&self) -> &Path {
        &self.binding.inner.root
    }

    /// Looks up an element this process has already registered.
    ///
    /// Returns `Ok(None)` if no in-process record exists; elements set up
    /// by other processes are not consulted.
    pub fn element(&self, element_name: &str) -> Result<Option<Element>> {
        name::validate_name(element_name)?;
        let state = lock(&self.binding.inner.state);
        Ok(state
            .elements
            .get(element_name)
            .and_then(Weak::upgrade)
            .map(Element::from_inner))
    }

    /// Sets up an element, or adopts the existing registration of the same
    /// name.
    ///
    /// If this process already holds a record for `element_name`, a new
    /// handle to it is returned with [`SetupStatus::Existed`] and **the
    /// requested configuration is not compared against the existing
    /// element's**, so a mismatched re-setup is not rejected. This mirrors
    /// the driver-side protocol, where re-requesting a claimed name is not
    /// an error either.
    ///
    /// The setup request is written while holding the context lock, so
    /// concurrent setup/release calls on the same context serialize for the
    /// full duration of their I/O.
    pub fn setup(&self, element_name: &str, config: &SetupConfig) -> Result<(Element, SetupStatus)> {
        name::validate_name(element_name)?;
        let inner = &self.binding.inner;
        let mut state = lock(&inner.state);

        if let Some(existing) = state.elements.get(element_name).and_then(Weak::upgrade) {
            return Ok((Element::from_inner(existing), SetupStatus::Existed));
        }

        // Whether the driver already knows this name decides how a partial
        // failure would have to be rolled back, and what to report on
        // success.
        let existed_in_sysfs = sysfs::element_dir(&inner.root, element_name).is_dir();

        let mut file = sysfs::open_control(&inner.root, ControlFile::Setup)?;
        sysfs::write_request(&mut file, &format!("{} {}", element_name, config.command()))?;

        let element = Arc::new(ElementInner::new(
            element_name.to_owned(),
            Arc::clone(inner),
        ));
        state
            .elements
            .insert(element_name.to_owned(), Arc::downgrade(&element));

        let status = if existed_in_sysfs {
            SetupStatus::Existed
        } else {
            SetupStatus::Created
        };
        Ok((Element::from_inner(element), status))
    }

    /// Sets up an encoder on the given pin pair.
    pub fn setup_encoder(
        &self,
        element_name: &str,
        pin_a: Pin,
        pull_a: PinPull,
        pin_b: Pin,
        pull_b: PinPull,
    ) -> Result<Element> {
        let (element, _) = self.setup(
            element_name,
            &SetupConfig::Encoder {
                pin_a,
                pull_a,
                pin_b,
                pull_b,
            },
        )?;
        Ok(element)
    }

    /// Sets up an analog input on the given pin.
    pub fn setup_analog_input(&self, element_name: &str, pin: Pin) -> Result<Element> {
        let (element, _) = self.setup(element_name, &SetupConfig::AnalogInput { pin })?;
        Ok(element)
    }

    /// Sets up a GPIO input with the given pull.
    pub fn setup_gpio_input(
        &self,
        element_name: &str,
        pin: Pin,
        pull: PinPull,
    ) -> Result<Element> {
        let (element, _) = self.setup(
            element_name,
            &SetupConfig::Gpio {
                pin,
                dir: GpioDir::Input(pull),
            },
        )?;
        Ok(element)
    }

    /// Sets up a GPIO output, initially driven `high` or low.
    pub fn setup_gpio_output(&self, element_name: &str, pin: Pin, high: bool) -> Result<Element> {
        let (element, _) = self.setup(
            element_name,
            &SetupConfig::Gpio {
                pin,
                dir: GpioDir::Output(high),
            },
        )?;
        Ok(element)
    }

    /// Sets up an activity indicator on the given pin.
    pub fn setup_activity(&self, element_name: &str, pin: Pin, kind: Activity) -> Result<Element> {
        let (element, _) = self.setup(element_name, &SetupConfig::Activity { pin, kind })?;
        Ok(element)
    }

    /// Generates a collision-resistant element name from this context's
    /// seed. An empty prefix yields the bare 22-character token.
    pub fn random_name(&self, prefix: &str) -> String {
        let mut state = lock(&self.binding.inner.state);
        name::random_name(&mut state.rng, prefix)
    }

    /// Writes an unsetup request for a name this process has no record of.
    ///
    /// Maintenance operation: releases driver-side state left behind by
    /// another (possibly crashed) process. For elements tracked by this
    /// process, drop the [`Element`] handles instead.
    pub fn unsetup(&self, element_name: &str) -> Result<()> {
        name::validate_name(element_name)?;
        let inner = &self.binding.inner;
        let _state = lock(&inner.state);
        inner.write_unsetup(element_name)
    }
}
