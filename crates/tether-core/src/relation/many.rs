use crate::{
    changeset::{Action, Changeset},
    entity::{Entity, Related},
    relation::{
        Incoming, Outcome, Reconciler, RelationError, Replacement,
        action::allowed_for,
        one::is_change,
    },
};

impl Reconciler<'_> {
    // One-to-many reconciliation.
    //
    // Each new element is matched against the first unclaimed current
    // element with the same identity; elements without identity claim
    // unkeyed current elements in order. Unclaimed current elements go
    // through the replacement policy and lead the output, followed by the
    // new elements in input order. Entries kept by `Ignore` stay as
    // unchanged updates so the applied list still holds them.
    pub(super) fn many(
        &self,
        current: &Related,
        new: Vec<Incoming>,
    ) -> Result<Outcome, RelationError> {
        let current = self.current_many(current)?;
        let mut claimed = vec![false; current.len()];
        let mut results = Vec::with_capacity(new.len());

        for incoming in new {
            let identity = self.identity_of(&incoming);
            let slot = current
                .iter()
                .enumerate()
                .position(|(i, entity)| !claimed[i] && self.identity_matches(&identity, entity));

            let changeset = match slot {
                Some(i) => {
                    claimed[i] = true;
                    self.update_changeset(incoming, &current[i], allowed_for(&identity))?
                }
                None => {
                    let changeset = self.insert_changeset(incoming, false)?;
                    self.check_new_identity(&changeset, &identity, current)?;
                    changeset
                }
            };

            if changeset.action() != Some(Action::Ignore) {
                results.push(changeset);
            }
        }

        let mut leading: Vec<Changeset> = Vec::new();
        let mut removed = false;
        for (entity, _) in current.iter().zip(&claimed).filter(|(_, taken)| !**taken) {
            match self.replace(entity)? {
                Replacement::Scheduled(changeset) => {
                    removed = true;
                    leading.push(changeset);
                }
                Replacement::Invalid => return Ok(self.invalid()),
                Replacement::Keep => {
                    leading.push(Changeset::change(entity.clone()).with_action(Action::Update));
                }
            }
        }

        let changed = removed || results.iter().any(is_change);
        leading.extend(results);

        Ok(self.require(Outcome::many(leading, changed)))
    }

    fn current_many<'r>(&self, current: &'r Related) -> Result<&'r [Entity], RelationError> {
        match self.loaded(current)? {
            None => Ok(&[]),
            Some(Related::Many(items)) => Ok(items.as_slice()),
            Some(_) => Err(self.cardinality_mismatch()),
        }
    }
}
