//! Kind-specific application of resolved outcomes on the authority.
//!
//! The transformer performs the spawn/destroy half of every outcome and
//! returns [`OutcomeEntry`] values describing what followers must mirror.
//! Value assignment, teleports and player effects are applied through the
//! replica, on every participant including the authority's own.

use tracing::{error, warn};

use crate::env::{AuthorityEnv, PropsContainer, RollContext, World, compute_seed};
use crate::outcome::{OutcomeResolver, Resolution, draw_magnitude};
use crate::replication::OutcomeEntry;
use crate::state::{ConverterSetting, CosmeticId, EntityHandle, HostileKey, Identity, Position, Region};

/// Effect a converter setting has on a player occupant.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum PlayerEffectKind {
    Kill,
    Damage,
    Cosmetic,
    Heal,
    Mimic,
}

impl PlayerEffectKind {
    /// Fixed setting → effect table.
    pub const fn for_setting(setting: ConverterSetting) -> Self {
        match setting {
            ConverterSetting::Rough => Self::Kill,
            ConverterSetting::Coarse => Self::Damage,
            ConverterSetting::OneToOne => Self::Cosmetic,
            ConverterSetting::Fine => Self::Heal,
            ConverterSetting::VeryFine => Self::Mimic,
        }
    }
}

/// Abstract effect on a player, replicated and applied by each participant.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum PlayerEffect {
    Kill,
    Damage(u32),
    Heal(u32),
    Cosmetic(CosmeticId),
    /// Player dies and `mimic` takes over its cosmetic.
    Mimic {
        mimic: EntityHandle,
        key: HostileKey,
        cosmetic: CosmeticId,
    },
}

impl PlayerEffect {
    pub fn kind(&self) -> PlayerEffectKind {
        match self {
            PlayerEffect::Kill => PlayerEffectKind::Kill,
            PlayerEffect::Damage(_) => PlayerEffectKind::Damage,
            PlayerEffect::Heal(_) => PlayerEffectKind::Heal,
            PlayerEffect::Cosmetic(_) => PlayerEffectKind::Cosmetic,
            PlayerEffect::Mimic { .. } => PlayerEffectKind::Mimic,
        }
    }
}

/// Closest navigable point to `point`, or `point` itself when snapping fails.
pub fn snap_to_nav(world: &dyn World, point: Position, radius: f32) -> Position {
    world.nav_position(point, radius).unwrap_or(point)
}

/// Applies resolved outcomes for one activation.
pub struct EntityTransformer<'e, 'a> {
    env: &'e mut AuthorityEnv<'a>,
    region: Region,
    container: PropsContainer,
    nonce: u64,
}

impl<'e, 'a> EntityTransformer<'e, 'a> {
    pub fn new(
        env: &'e mut AuthorityEnv<'a>,
        region: Region,
        container: PropsContainer,
        nonce: u64,
    ) -> Self {
        Self {
            env,
            region,
            container,
            nonce,
        }
    }

    fn seed(&self, handle: EntityHandle, context: RollContext) -> u64 {
        compute_seed(self.env.session.seed, self.nonce, handle.0, context)
    }

    /// Random point in the output region for `handle`, snapped to the
    /// navigable surface when possible.
    ///
    /// The horizontal spread is the smaller of the X and Z extents; the point
    /// sits half the vertical extent below the region centre.
    pub fn sample_point(&self, handle: EntityHandle) -> Position {
        let Region { center, extents } = self.region;
        let spread = extents.x.min(extents.z).abs();
        let rng = self.env.rng;
        let raw = Position::new(
            center.x + rng.span(self.seed(handle, RollContext::OffsetX), -spread, spread),
            center.y - extents.y / 2.0,
            center.z + rng.span(self.seed(handle, RollContext::OffsetZ), -spread, spread),
        );
        snap_to_nav(&*self.env.world, raw, self.env.config.nav_radius)
    }

    /// Resolves and applies the outcome for an object or hostile occupant.
    ///
    /// The source is destroyed as soon as a decision exists, even when the
    /// replacement then fails to spawn.
    pub fn convert(
        &mut self,
        source: EntityHandle,
        identity: &Identity,
        setting: ConverterSetting,
    ) -> Vec<OutcomeEntry> {
        let resolution = OutcomeResolver::new(self.env.table, self.env.catalog, self.env.rng)
            .resolve(identity, setting, self.seed(source, RollContext::Candidate));

        let replacement = match resolution {
            Resolution::Unavailable => return Vec::new(),
            Resolution::Destroy => None,
            Resolution::Replace { identity, .. } => Some(identity),
        };

        if let Err(err) = self.env.world.destroy(source) {
            warn!(target: "device::converter", %source, %err, "destroy failed");
        }

        let Some(identity) = replacement else {
            return vec![OutcomeEntry::Destroyed { source }];
        };

        let position = self.sample_point(source);
        match self.env.world.spawn(&identity, position, self.container) {
            Ok(instance) => {
                let value = draw_magnitude(
                    self.env.catalog,
                    &identity,
                    self.env.session.value_multiplier,
                    self.env.rng,
                    self.seed(source, RollContext::Magnitude),
                );
                vec![OutcomeEntry::Spawned {
                    source,
                    instance,
                    identity,
                    position,
                    value,
                }]
            }
            Err(err) => {
                warn!(target: "device::converter", %source, %identity, %err, "replacement spawn failed");
                vec![OutcomeEntry::Destroyed { source }]
            }
        }
    }

    /// Relocates a player into the output region and picks its setting effect.
    pub fn convert_player(
        &mut self,
        player: EntityHandle,
        cosmetic: CosmeticId,
        setting: ConverterSetting,
    ) -> OutcomeEntry {
        let relocate = self.sample_point(player);
        let (damage, heal) = (
            self.env.config.converter.damage,
            self.env.config.converter.heal,
        );
        let effect = match PlayerEffectKind::for_setting(setting) {
            PlayerEffectKind::Kill => Some(PlayerEffect::Kill),
            PlayerEffectKind::Damage => Some(PlayerEffect::Damage(damage)),
            PlayerEffectKind::Heal => Some(PlayerEffect::Heal(heal)),
            PlayerEffectKind::Cosmetic => self.reassign_cosmetic(player, cosmetic),
            PlayerEffectKind::Mimic => self.mimic(player, cosmetic, relocate),
        };
        OutcomeEntry::Player {
            player,
            relocate,
            effect,
        }
    }

    fn reassign_cosmetic(&self, player: EntityHandle, current: CosmeticId) -> Option<PlayerEffect> {
        let choices: Vec<CosmeticId> = self
            .env
            .session
            .cosmetics
            .iter()
            .copied()
            .filter(|id| *id != current)
            .collect();
        if choices.is_empty() {
            warn!(target: "device::converter", %player, "no alternative cosmetic available");
            return None;
        }
        let index = self
            .env
            .rng
            .pick(self.seed(player, RollContext::Cosmetic), choices.len());
        Some(PlayerEffect::Cosmetic(choices[index]))
    }

    fn mimic(
        &mut self,
        player: EntityHandle,
        cosmetic: CosmeticId,
        at: Position,
    ) -> Option<PlayerEffect> {
        if !self.env.session.death_allowed {
            return None;
        }
        let key = self.env.config.converter.mimic_key();
        if self.env.catalog.hostile(&key).is_none() {
            error!(target: "device::converter", %player, mimic = %key, "mimic identity missing from catalog");
            return Some(PlayerEffect::Kill);
        }
        match self
            .env
            .world
            .spawn(&Identity::Hostile(key.clone()), at, self.container)
        {
            Ok(mimic) => Some(PlayerEffect::Mimic {
                mimic,
                key,
                cosmetic,
            }),
            Err(err) => {
                warn!(target: "device::converter", %player, %err, "mimic spawn failed");
                Some(PlayerEffect::Kill)
            }
        }
    }
}
