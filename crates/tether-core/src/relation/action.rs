use crate::{
    changeset::{Action, Changeset},
    entity::{Entity, Identity, PersistenceState},
    relation::{Incoming, Reconciler, RelationError},
};

///
/// Allowed actions per reconciliation path.
///
/// INSERT_ONLY → new input with no current counterpart
/// EXISTING    → new input matched to a current entity by identity
/// ANY         → new input paired positionally with an unkeyed current entity
///

pub(super) const INSERT_ONLY: &[Action] = &[Action::Insert];
pub(super) const EXISTING: &[Action] = &[Action::Update, Action::Delete];
pub(super) const ANY: &[Action] = &[Action::Insert, Action::Update, Action::Delete];

pub(super) fn allowed_for(identity: &Identity) -> &'static [Action] {
    if identity.is_empty() { ANY } else { EXISTING }
}

/// Default action for a record supplied without an explicit action.
///
/// Deleted records are deletions on every path. On the insert path a
/// persisted record is an update of something the owner does not hold,
/// which the allowed-action check then rejects.
pub(super) const fn default_action(state: PersistenceState, insert_path: bool) -> Action {
    match (state, insert_path) {
        (PersistenceState::Deleted, _) => Action::Delete,
        (PersistenceState::Built, true) => Action::Insert,
        (PersistenceState::Loaded, true) | (_, false) => Action::Update,
    }
}

impl Reconciler<'_> {
    /// Changeset for input that has no current counterpart.
    /// Parameters are cast onto a freshly synthesized entity.
    pub(super) fn insert_changeset(
        &self,
        incoming: Incoming,
        with_defaults: bool,
    ) -> Result<Changeset, RelationError> {
        let mut changeset = match incoming {
            Incoming::Params(params) => {
                let base = self.synthesize(&self.params_identity(&params), with_defaults);

                self.builder().build(base, &params)
            }
            Incoming::Entity(entity) => {
                let action = default_action(entity.state(), true);
                Changeset::change(entity).with_action(action)
            }
            Incoming::Changeset(mut changeset) => {
                let action = default_action(changeset.data().state(), true);
                changeset.put_new_action(action);
                changeset
            }
        };
        changeset.put_new_action(Action::Insert);

        self.check_action(&changeset, INSERT_ONLY)?;

        Ok(changeset)
    }

    /// Changeset for input matched to `current`; `current` is the base.
    pub(super) fn update_changeset(
        &self,
        incoming: Incoming,
        current: &Entity,
        allowed: &[Action],
    ) -> Result<Changeset, RelationError> {
        let mut changeset = match incoming {
            Incoming::Params(params) => self.builder().build(current.clone(), &params),
            Incoming::Entity(entity) => {
                let action = default_action(entity.state(), false);
                Changeset::change(current.clone())
                    .change_fields(&entity)
                    .with_action(action)
            }
            Incoming::Changeset(changeset) => {
                let action = default_action(changeset.data().state(), false);
                let mut changeset = changeset.rebase(current);
                changeset.put_new_action(action);
                changeset
            }
        };
        changeset.put_new_action(Action::Update);

        self.check_action(&changeset, allowed)?;

        Ok(changeset)
    }

    /// An insert may not carry the identity of any current entity, including
    /// one an earlier input element already claimed.
    pub(super) fn check_new_identity(
        &self,
        changeset: &Changeset,
        identity: &Identity,
        current: &[Entity],
    ) -> Result<(), RelationError> {
        if changeset.action() != Some(Action::Insert) || identity.is_empty() {
            return Ok(());
        }

        match current.iter().find(|e| self.identity_matches(identity, e)) {
            Some(existing) => Err(RelationError::AlreadyExists {
                association: self.descriptor.path(),
                entity: self.describe(existing),
            }),
            None => Ok(()),
        }
    }

        /// Reject actions that contradict the current association state.
    /// `Ignore` is always allowed.
    pub(super) fn check_action(
        &self,
        changeset: &Changeset,
        allowed: &[Action],
    ) -> Result<(), RelationError> {
        let action = match changeset.action() {
            None | Some(Action::Ignore) => return Ok(()),
            Some(action) if allowed.contains(&action) => return Ok(()),
            Some(action) => action,
        };

        let association = self.descriptor.path();
        let entity = self.describe(changeset.data());

        Err(match action {
            Action::Insert => RelationError::AlreadyExists {
                association,
                entity,
            },
            _ => RelationError::InconsistentAction {
                association,
                action,
                entity,
            },
        })
    }
}

///
/// TESTS
///
