// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

//! Add/edit lifecycle of one entity, independent of how its fields are laid
//! out on screen.

use anyhow::{Context, Result, bail};

use crate::field::{Entity, FieldValue, changed_fields};
use crate::gateway::{BodyEncoding, Gateway, GatewayExt};
use crate::ids::ActorProvider;
use crate::lookup::{LookupHierarchy, LookupNode};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitMode {
    Save,
    SaveAndNext,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionMode {
    Add,
    Edit(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// Saved; the screen should leave. The navigation guard lets the next
    /// leave through unasked.
    NavigateAway,
    /// Saved in add mode and reset for the next entry.
    StayOnForm,
    /// Validation refused the entity; nothing was sent.
    Invalid(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionCommand {
    Submit,
    SaveAndNext,
    Reset,
}

/// Asked before leaving a screen with unsaved edits.
pub trait LeaveConfirmation {
    fn confirm_leave(&mut self) -> bool;
}

impl<F: FnMut() -> bool> LeaveConfirmation for F {
    fn confirm_leave(&mut self) -> bool {
        self()
    }
}

#[derive(Debug, Clone)]
struct CascadeBinding {
    fields: Vec<&'static str>,
    hierarchy: LookupHierarchy,
}

#[derive(Debug, Clone)]
pub struct EditSession<E: Entity> {
    endpoint: String,
    mode: SessionMode,
    snapshot: E,
    current: E,
    is_submitting: bool,
    encoding: BodyEncoding,
    sticky_fields: Vec<&'static str>,
    cascade: Option<CascadeBinding>,
    skip_guard_once: bool,
}

impl<E: Entity> EditSession<E> {
    pub fn new(endpoint: &str) -> Self {
        Self {
            endpoint: endpoint.to_owned(),
            mode: SessionMode::Add,
            snapshot: E::default(),
            current: E::default(),
            is_submitting: false,
            encoding: BodyEncoding::Json,
            sticky_fields: Vec::new(),
            cascade: None,
            skip_guard_once: false,
        }
    }

    pub fn with_encoding(mut self, encoding: BodyEncoding) -> Self {
        self.encoding = encoding;
        self
    }

    /// Fields carried into the fresh entity after save-and-next.
    pub fn with_sticky_fields(mut self, fields: &[&'static str]) -> Self {
        self.sticky_fields = fields.to_vec();
        self
    }

    /// Binds entity fields, top level first, to the levels of a lookup
    /// hierarchy so that changing a parent clears its dependents.
    pub fn with_cascade(mut self, hierarchy: LookupHierarchy, fields: &[&'static str]) -> Result<Self> {
        if fields.len() != hierarchy.depth() {
            bail!(
                "cascade binds {} fields to a hierarchy of depth {}",
                fields.len(),
                hierarchy.depth()
            );
        }
        self.cascade = Some(CascadeBinding {
            fields: fields.to_vec(),
            hierarchy,
        });
        self.sync_cascade()?;
        Ok(self)
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn mode(&self) -> &SessionMode {
        &self.mode
    }

    pub fn snapshot(&self) -> &E {
        &self.snapshot
    }

    pub fn current(&self) -> &E {
        &self.current
    }

    pub fn is_submitting(&self) -> bool {
        self.is_submitting
    }

    pub fn is_dirty(&self) -> bool {
        !self.dirty_fields().is_empty()
    }

    pub fn dirty_fields(&self) -> Vec<&'static str> {
        changed_fields(&self.snapshot, &self.current)
    }

    /// Opens the session: a blank entity without `id`, else the fetched one.
    pub fn load<G: Gateway + ?Sized>(&mut self, gateway: &G, id: Option<&str>) -> Result<()> {
        let (mode, entity) = match id {
            None => (SessionMode::Add, E::default()),
            Some(id) => {
                let entity: E = gateway
                    .fetch_by_id(&self.endpoint, id)
                    .with_context(|| format!("load {} {id}", self.endpoint))?;
                if entity.is_new() {
                    bail!("{} {id} came back without a saved id", self.endpoint);
                }
                (SessionMode::Edit(id.to_owned()), entity)
            }
        };

        self.mode = mode;
        self.snapshot = entity.clone();
        self.current = entity;
        self.is_submitting = false;
        self.skip_guard_once = false;
        self.sync_cascade()
    }

    pub fn set_field(&mut self, name: &str, value: impl Into<FieldValue>) -> Result<()> {
        self.current.set_field(name, value.into())?;
        self.current.field_changed(name);

        let Some(binding) = self.cascade.as_mut() else {
            return Ok(());
        };
        let Some(level) = binding.fields.iter().position(|field| *field == name) else {
            return Ok(());
        };

        let selected = selected_id(&self.current.field(name));
        let cleared = binding.hierarchy.on_parent_change(level, selected)?;
        for dependent in cleared {
            let field = binding.fields[dependent];
            self.current.set_field(field, FieldValue::Null)?;
            self.current.field_changed(field);
        }
        Ok(())
    }

    /// Options for a cascade-bound field under its currently selected parent.
    pub fn options_for(&self, field: &str) -> Vec<&LookupNode> {
        let Some(binding) = self.cascade.as_ref() else {
            return Vec::new();
        };
        binding
            .fields
            .iter()
            .position(|bound| *bound == field)
            .map(|level| binding.hierarchy.current_options(level))
            .unwrap_or_default()
    }

    pub fn label_for(&self, field: &str) -> Option<String> {
        let binding = self.cascade.as_ref()?;
        let level = binding.fields.iter().position(|bound| *bound == field)?;
        let id = selected_id(&self.current.field(field))?;
        Some(binding.hierarchy.label(level, id))
    }

    pub fn load_lookup_level(&mut self, level: usize, nodes: Vec<LookupNode>) -> Result<()> {
        if let Some(binding) = self.cascade.as_mut() {
            return binding.hierarchy.load_level(level, nodes);
        }
        bail!("session for {} has no cascading lookup bound", self.endpoint)
    }

    /// Discards edits and stays on the form.
    pub fn reset(&mut self) -> Result<()> {
        self.current = self.snapshot.clone();
        self.sync_cascade()
    }

    pub fn submit<G, V>(
        &mut self,
        mode: SubmitMode,
        gateway: &G,
        actor: &dyn ActorProvider,
        validate: V,
    ) -> Result<SubmitOutcome>
    where
        G: Gateway + ?Sized,
        V: FnOnce(&E) -> Result<()>,
    {
        if self.is_submitting {
            bail!("{} is already being saved", self.endpoint);
        }
        if let Err(error) = validate(&self.current) {
            return Ok(SubmitOutcome::Invalid(format!("{error:#}")));
        }

        self.is_submitting = true;
        let result = self.send(gateway, actor);
        self.is_submitting = false;
        result?;

        self.snapshot = self.current.clone();
        match (&self.mode, mode) {
            (SessionMode::Add, SubmitMode::SaveAndNext) => {
                self.start_next_entry()?;
                Ok(SubmitOutcome::StayOnForm)
            }
            _ => {
                self.skip_guard_once = true;
                Ok(SubmitOutcome::NavigateAway)
            }
        }
    }

    /// Suppresses the navigation guard for exactly one leave request.
    pub fn allow_next_navigation(&mut self) {
        self.skip_guard_once = true;
    }

    /// Whether the screen may be left now. Unsaved edits are confirmed
    /// through `confirm` unless a save is in flight or the guard was
    /// suppressed.
    pub fn request_leave(&mut self, confirm: &mut dyn LeaveConfirmation) -> bool {
        if self.skip_guard_once {
            self.skip_guard_once = false;
            return true;
        }
        if self.is_dirty() && !self.is_submitting {
            return confirm.confirm_leave();
        }
        true
    }

    /// Borrows the session as a command object for a parent screen.
    pub fn commands<'s, G, V>(
        &'s mut self,
        gateway: &'s G,
        actor: &'s dyn ActorProvider,
        validate: V,
    ) -> SessionCommands<'s, E, G, V>
    where
        G: Gateway + ?Sized,
        V: Fn(&E) -> Result<()>,
    {
        SessionCommands {
            session: self,
            gateway,
            actor,
            validate,
        }
    }

    fn send<G: Gateway + ?Sized>(&self, gateway: &G, actor: &dyn ActorProvider) -> Result<()> {
        let payload = serde_json::to_value(&self.current)
            .with_context(|| format!("encode {} payload", self.endpoint))?;
        let actor = actor.actor_or_anonymous();

        let response = match &self.mode {
            SessionMode::Add => gateway.create(&self.endpoint, &payload, &actor, self.encoding)?,
            SessionMode::Edit(id) => {
                gateway.update(&self.endpoint, id, &payload, &actor, self.encoding)?
            }
        };
        tracing::debug!(
            endpoint = %self.endpoint,
            status = response.status,
            created = ?response.created_id(),
            "entity saved"
        );
        Ok(())
    }

    fn start_next_entry(&mut self) -> Result<()> {
        let mut next = E::default();
        for field in &self.sticky_fields {
            next.set_field(field, self.current.field(field))?;
            next.field_changed(field);
        }
        self.snapshot = next.clone();
        self.current = next;
        self.sync_cascade()
    }

    fn sync_cascade(&mut self) -> Result<()> {
        let Some(binding) = self.cascade.as_mut() else {
            return Ok(());
        };
        for (level, field) in binding.fields.iter().enumerate() {
            let selected = selected_id(&self.current.field(field));
            binding.hierarchy.on_parent_change(level, selected)?;
        }
        Ok(())
    }
}

fn selected_id(value: &FieldValue) -> Option<i64> {
    match value {
        FieldValue::Int(id) if *id > 0 => Some(*id),
        FieldValue::Text(text) => text.trim().parse().ok().filter(|id: &i64| *id > 0),
        _ => None,
    }
}

/// Submit, save-and-next and reset bound to one session, for a parent screen
/// that orchestrates the form without owning it.
pub struct SessionCommands<'s, E: Entity, G: Gateway + ?Sized, V> {
    session: &'s mut EditSession<E>,
    gateway: &'s G,
    actor: &'s dyn ActorProvider,
    validate: V,
}

impl<E, G, V> SessionCommands<'_, E, G, V>
where
    E: Entity,
    G: Gateway + ?Sized,
    V: Fn(&E) -> Result<()>,
{
    pub fn submit(&mut self) -> Result<SubmitOutcome> {
        self.session
            .submit(SubmitMode::Save, self.gateway, self.actor, &self.validate)
    }

    pub fn save_and_next(&mut self) -> Result<SubmitOutcome> {
        self.session
            .submit(SubmitMode::SaveAndNext, self.gateway, self.actor, &self.validate)
    }

    pub fn reset(&mut self) -> Result<()> {
        self.session.reset()
    }

    /// Runs a command; `Reset` reports `None`.
    pub fn run(&mut self, command: SessionCommand) -> Result<Option<SubmitOutcome>> {
        match command {
            SessionCommand::Submit => self.submit().map(Some),
            SessionCommand::SaveAndNext => self.save_and_next().map(Some),
            SessionCommand::Reset => self.reset().map(|()| None),
        }
    }
}
