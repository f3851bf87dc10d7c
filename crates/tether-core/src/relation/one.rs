use crate::{
    changeset::{Action, Changeset},
    entity::{Entity, Related},
    model::OnReplace,
    relation::{
        Incoming, Outcome, Reconciler, RelationError, Replacement,
        action::allowed_for,
    },
};

impl Reconciler<'_> {
    // One-to-one reconciliation.
    //
    // (nil, nil)          → empty, unchanged
    // (nil, current)      → replacement policy on current
    // (new, nil)          → insert
    // (new, same current) → update over current
    // (new, other)        → replacement policy on current, then insert
    pub(super) fn one(
        &self,
        current: &Related,
        new: Option<Incoming>,
    ) -> Result<Outcome, RelationError> {
        let current = self.current_one(current)?;

        let outcome = match (new, current) {
            (None, None) => Outcome::one(None, None, false),
            (None, Some(current)) => match self.replace(current)? {
                Replacement::Scheduled(replaced) => Outcome::one(None, Some(replaced), true),
                Replacement::Invalid => return Ok(self.invalid()),
                Replacement::Keep => return Ok(Outcome::untouched()),
            },
            (Some(new), None) => {
                let changeset = self.insert_changeset(new, true)?;
                Self::one_result(changeset)
            }
            (Some(new), Some(current)) => {
                let identity = self.identity_of(&new);

                if self.on_replace == OnReplace::Update || self.identity_matches(&identity, current)
                {
                    let changeset = self.update_changeset(new, current, allowed_for(&identity))?;
                    Self::one_result(changeset)
                } else {
                    let changeset = self.insert_changeset(new, true)?;
                    if changeset.action() == Some(Action::Ignore) {
                        return Ok(Outcome::untouched());
                    }

                    match self.replace(current)? {
                        Replacement::Scheduled(replaced) => {
                            Outcome::one(Some(changeset), Some(replaced), true)
                        }
                        Replacement::Invalid => return Ok(self.invalid()),
                        Replacement::Keep => return Ok(Outcome::untouched()),
                    }
                }
            }
        };

        Ok(self.require(outcome))
    }

    fn current_one<'r>(&self, current: &'r Related) -> Result<Option<&'r Entity>, RelationError> {
        match self.loaded(current)? {
            None | Some(Related::One(None)) => Ok(None),
            Some(Related::One(Some(entity))) => Ok(Some(entity.as_ref())),
            Some(_) => Err(self.cardinality_mismatch()),
        }
    }

    fn one_result(changeset: Changeset) -> Outcome {
        if changeset.action() == Some(Action::Ignore) {
            return Outcome::untouched();
        }

        let changed = is_change(&changeset);
        Outcome::one(Some(changeset), None, changed)
    }
}

/// Whether a changeset needs persistence work or carries errors the
/// parent must see. Only valid, unchanged updates are skipped.
pub(super) fn is_change(changeset: &Changeset) -> bool {
    match changeset.action() {
        Some(Action::Insert | Action::Delete) => true,
        Some(Action::Update) | None => {
            changeset.has_changes() || changeset.is_detached() || !changeset.is_valid()
        }
        Some(Action::Ignore) => false,
    }
}
