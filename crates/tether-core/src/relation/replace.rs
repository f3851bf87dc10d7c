use crate::{
    changeset::{Action, Changeset},
    entity::Entity,
    model::OnReplace,
    obs::sink::{MetricsEvent, record},
    relation::{Reconciler, RelationError, Replacement},
};

impl Reconciler<'_> {
    /// Decide the fate of a current entity the new input drops or displaces.
    ///
    /// RaiseError  → fatal
    /// MarkInvalid → parent gets "is invalid", nothing else changes
    /// Delete      → delete changeset (also for `Update` when nothing replaces it)
    /// Nilify      → foreign key cleared, entity detached from the owner
    /// Ignore      → entity stays as it is
    pub(super) fn replace(&self, current: &Entity) -> Result<Replacement, RelationError> {
        record(MetricsEvent::Replace {
            association: self.descriptor.path(),
            policy: self.on_replace,
        });

        let replacement = match self.on_replace {
            OnReplace::RaiseError => {
                return Err(RelationError::ReplaceForbidden {
                    association: self.descriptor.path(),
                    entity: self.describe(current),
                });
            }
            OnReplace::MarkInvalid => Replacement::Invalid,
            OnReplace::Delete | OnReplace::Update => {
                let mut changeset = Changeset::change(current.clone());
                changeset.set_action(Action::Delete);
                Replacement::Scheduled(changeset)
            }
            OnReplace::Nilify => {
                let mut changeset = Changeset::change(current.clone());
                changeset.nilify(&self.descriptor.related_key);
                Replacement::Scheduled(changeset)
            }
            OnReplace::Ignore => Replacement::Keep,
        };

        Ok(replacement)
    }
}
