use std::sync::Arc;

use rustc_hash::FxHashMap;
use slotmap::{Key, SlotMap};
use uuid::Uuid;

use crate::animation::action::{ActionHandle, AnimationAction, BindingKey};
use crate::animation::binder::Binder;
use crate::animation::clip::{AnimationClip, BlendMode};
use crate::animation::events::MixerEvent;
use crate::animation::property_mixer::PropertyMixer;
use crate::errors::Result;
use crate::scene::{NodeHandle, Scene};

/// Pool usage counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PoolStats {
    pub total: usize,
    pub in_use: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MixerStats {
    pub actions: PoolStats,
    pub bindings: PoolStats,
}

/// Plays clips on a scene.
///
/// The mixer owns every action and every bound property. Actions are cached
/// per `(clip, root, blend mode)`; property mixers are shared per
/// `(root, track name)` and reference counted across actions.
///
/// Both pools keep an order vector with the active entries first, so
/// activation and deactivation swap an entry across the boundary in O(1) and
/// `update` walks only the active prefix.
pub struct AnimationMixer {
    root: NodeHandle,

    /// Mixer clock in seconds.
    pub time: f32,
    /// Global speed factor applied to every `update` delta.
    pub time_scale: f32,

    actions: SlotMap<ActionHandle, AnimationAction>,
    action_order: Vec<ActionHandle>,
    n_active_actions: usize,
    actions_by_clip: FxHashMap<Uuid, FxHashMap<(NodeHandle, BlendMode), ActionHandle>>,

    bindings: SlotMap<BindingKey, PropertyMixer>,
    binding_order: Vec<BindingKey>,
    n_active_bindings: usize,
    bindings_by_root: FxHashMap<NodeHandle, FxHashMap<String, BindingKey>>,

    accu_index: usize,
    events: Vec<MixerEvent>,
}

impl AnimationMixer {
    /// Creates a mixer whose actions bind below `root` unless told otherwise.
    #[must_use]
    pub fn new(root: NodeHandle) -> Self {
        Self {
            root,
            time: 0.0,
            time_scale: 1.0,
            actions: SlotMap::with_key(),
            action_order: Vec::new(),
            n_active_actions: 0,
            actions_by_clip: FxHashMap::default(),
            bindings: SlotMap::with_key(),
            binding_order: Vec::new(),
            n_active_bindings: 0,
            bindings_by_root: FxHashMap::default(),
            accu_index: 0,
            events: Vec::new(),
        }
    }

    #[inline]
    #[must_use]
    pub fn root(&self) -> NodeHandle {
        self.root
    }

    // ========================================================================
    // Action cache
    // ========================================================================

    /// Returns the action playing `clip` on `root` (default: the mixer root),
    /// creating and binding it on first request.
    ///
    /// The clip is validated here; a malformed clip is rejected with an error.
    pub fn clip_action(
        &mut self,
        scene: &Scene,
        clip: &Arc<AnimationClip>,
        root: Option<NodeHandle>,
        blend_mode: Option<BlendMode>,
    ) -> Result<ActionHandle> {
        let root = root.unwrap_or(self.root);
        let blend_mode = blend_mode.unwrap_or(clip.blend_mode());

        if let Some(handle) = self.existing_action(clip, Some(root), Some(blend_mode)) {
            return Ok(handle);
        }

        clip.validate()?;

        let handle = self
            .actions
            .insert_with_key(|handle| AnimationAction::new(handle, Arc::clone(clip), root, blend_mode));
        self.bind_action(handle, scene);

        if let Some(action) = self.actions.get_mut(handle) {
            action.cache_index = self.action_order.len();
        }
        self.action_order.push(handle);

        self.actions_by_clip
            .entry(clip.uuid())
            .or_default()
            .insert((root, blend_mode), handle);

        log::debug!(
            "AnimationMixer: cached action for clip '{}' ({} actions, {} bindings)",
            clip.name(),
            self.actions.len(),
            self.bindings.len()
        );
        Ok(handle)
    }

    /// Looks up a cached action without creating one.
    #[must_use]
    pub fn existing_action(
        &self,
        clip: &AnimationClip,
        root: Option<NodeHandle>,
        blend_mode: Option<BlendMode>,
    ) -> Option<ActionHandle> {
        let root = root.unwrap_or(self.root);
        let blend_mode = blend_mode.unwrap_or(clip.blend_mode());
        self.actions_by_clip.get(&clip.uuid())?.get(&(root, blend_mode)).copied()
    }

    #[must_use]
    pub fn action(&self, handle: ActionHandle) -> Option<&AnimationAction> {
        self.actions.get(handle)
    }

    pub fn action_mut(&mut self, handle: ActionHandle) -> Option<&mut AnimationAction> {
        self.actions.get_mut(handle)
    }

    /// All cached actions, in no particular order.
    pub fn actions(&self) -> impl Iterator<Item = (ActionHandle, &AnimationAction)> {
        self.actions.iter()
    }

    /// The shared property mixer behind track `track_index` of an action.
    #[must_use]
    pub fn binding(&self, handle: ActionHandle, track_index: usize) -> Option<&PropertyMixer> {
        let key = *self.actions.get(handle)?.bindings.get(track_index)?;
        self.bindings.get(key)
    }

    fn bind_action(&mut self, handle: ActionHandle, scene: &Scene) {
        let Some(action) = self.actions.get_mut(handle) else {
            return;
        };
        let root = action.root();
        let clip = Arc::clone(action.clip());
        let by_name = self.bindings_by_root.entry(root).or_default();

        let mut keys = Vec::with_capacity(clip.tracks().len());
        for track in clip.tracks() {
            let key = if let Some(&key) = by_name.get(track.name()) {
                if let Some(existing) = self.bindings.get(key)
                    && existing.value_size() != track.value_size()
                {
                    log::warn!(
                        "Track '{}' of clip '{}': value size {} differs from the bound property ({})",
                        track.name(),
                        clip.name(),
                        track.value_size(),
                        existing.value_size()
                    );
                }
                key
            } else {
                let binding = Binder::bind(scene, root, track);
                let mixer = PropertyMixer::new(binding, track.value_type(), track.value_size());
                let key = self.bindings.insert(mixer);
                if let Some(mixer) = self.bindings.get_mut(key) {
                    mixer.cache_index = self.binding_order.len();
                }
                self.binding_order.push(key);
                by_name.insert(track.name().to_string(), key);
                key
            };

            if let Some(mixer) = self.bindings.get_mut(key) {
                mixer.reference_count += 1;
            }
            keys.push(key);
        }

        action.bindings = keys;
    }

    // ========================================================================
    // Playback
    // ========================================================================

    /// Activates an action. The first activation of each bound property
    /// captures its original state.
    pub fn play(&mut self, handle: ActionHandle, scene: &Scene) {
        let Some(action) = self.actions.get(handle) else {
            log::debug!("AnimationMixer: play on an uncached action ignored");
            return;
        };
        if action.active {
            return;
        }

        for key in action.bindings.clone() {
            let Some(mixer) = self.bindings.get_mut(key) else {
                continue;
            };
            mixer.use_count += 1;
            if mixer.use_count == 1 {
                mixer.save_original_state(scene);
                lend(&mut self.binding_order, &mut self.n_active_bindings, &mut self.bindings, key);
            }
        }

        lend(&mut self.action_order, &mut self.n_active_actions, &mut self.actions, handle);
        if let Some(action) = self.actions.get_mut(handle) {
            action.active = true;
        }
    }

    /// Deactivates an action and rewinds it. Properties no longer written by
    /// any active action get their original state back.
    pub fn stop(&mut self, handle: ActionHandle, scene: &mut Scene) {
        self.deactivate(handle, scene);
        if let Some(action) = self.actions.get_mut(handle) {
            action.reset();
        }
    }

    /// Stops every active action.
    pub fn stop_all_action(&mut self, scene: &mut Scene) {
        let active: Vec<ActionHandle> = self.action_order[..self.n_active_actions].to_vec();
        for handle in active {
            self.stop(handle, scene);
        }
    }

    /// Fades `from` out and `to` in over `duration` (see
    /// [`AnimationAction::cross_fade_from`]).
    pub fn cross_fade(&mut self, from: ActionHandle, to: ActionHandle, duration: f32, warp: bool) {
        let Some([to_action, from_action]) = self.actions.get_disjoint_mut([to, from]) else {
            log::debug!("AnimationMixer: cross-fade needs two distinct cached actions");
            return;
        };
        to_action.cross_fade_from(from_action, duration, warp);
    }

    fn deactivate(&mut self, handle: ActionHandle, scene: &mut Scene) {
        let Some(action) = self.actions.get_mut(handle) else {
            return;
        };
        if !action.active {
            return;
        }
        action.active = false;
        let keys = action.bindings.clone();

        for key in keys {
            let Some(mixer) = self.bindings.get_mut(key) else {
                continue;
            };
            mixer.use_count = mixer.use_count.saturating_sub(1);
            if mixer.use_count == 0 {
                mixer.restore_original_state(scene);
                take_back(&mut self.binding_order, &mut self.n_active_bindings, &mut self.bindings, key);
            }
        }

        take_back(&mut self.action_order, &mut self.n_active_actions, &mut self.actions, handle);
    }

    /// Advances the clock by `delta` seconds (scaled by `time_scale`), runs
    /// every active action, then writes every active property once.
    ///
    /// `delta == 0` re-applies the current pose, overwriting whatever the host
    /// wrote to the bound properties since the last update.
    pub fn update(&mut self, delta: f32, scene: &mut Scene) {
        let reapply = delta == 0.0;
        let delta = delta * self.time_scale;
        self.time += delta;
        self.accu_index ^= 1;

        for &handle in &self.action_order[..self.n_active_actions] {
            if let Some(action) = self.actions.get_mut(handle) {
                action.update(self.time, delta, self.accu_index, &mut self.bindings, &mut self.events);
            }
        }

        for &key in &self.binding_order[..self.n_active_bindings] {
            if let Some(mixer) = self.bindings.get_mut(key) {
                mixer.apply(self.accu_index, reapply, scene);
            }
        }
    }

    /// Seeks: rewinds the clock and every action, then updates by `time`.
    pub fn set_time(&mut self, time: f32, scene: &mut Scene) {
        self.time = 0.0;
        for action in self.actions.values_mut() {
            action.time = 0.0;
        }
        self.update(time, scene);
    }

    /// Takes the events queued since the last drain.
    pub fn drain_events(&mut self) -> Vec<MixerEvent> {
        std::mem::take(&mut self.events)
    }

    // ========================================================================
    // Uncaching
    // ========================================================================

    /// Releases every action playing `clip`, and bindings no longer used.
    pub fn uncache_clip(&mut self, clip: &AnimationClip, scene: &mut Scene) {
        let Some(by_root) = self.actions_by_clip.remove(&clip.uuid()) else {
            return;
        };
        for handle in by_root.into_values() {
            self.deactivate(handle, scene);
            self.remove_action(handle);
        }
        log::debug!("AnimationMixer: uncached clip '{}'", clip.name());
    }

    /// Releases every action and binding on `root`, restoring original state.
    pub fn uncache_root(&mut self, root: NodeHandle, scene: &mut Scene) {
        let handles: Vec<ActionHandle> = self
            .actions
            .iter()
            .filter(|(_, action)| action.root() == root)
            .map(|(handle, _)| handle)
            .collect();

        for handle in handles {
            self.deactivate(handle, scene);
            self.remove_action(handle);
        }

        if let Some(by_name) = self.bindings_by_root.remove(&root) {
            for key in by_name.into_values() {
                if let Some(mixer) = self.bindings.get_mut(key) {
                    mixer.restore_original_state(scene);
                }
                self.remove_binding(key);
            }
        }
    }

    /// Releases the action playing `clip` on `root` (default: the mixer root).
    pub fn uncache_action(&mut self, clip: &AnimationClip, root: Option<NodeHandle>, scene: &mut Scene) {
        let root = root.unwrap_or(self.root);
        let handles: Vec<ActionHandle> = self
            .actions_by_clip
            .get(&clip.uuid())
            .map(|by_root| {
                by_root
                    .iter()
                    .filter(|((r, _), _)| *r == root)
                    .map(|(_, &handle)| handle)
                    .collect()
            })
            .unwrap_or_default();

        for handle in handles {
            self.deactivate(handle, scene);
            self.remove_action(handle);
        }
    }

    /// Removes an inactive action from every index and drops its binding references.
    fn remove_action(&mut self, handle: ActionHandle) {
        let Some(action) = self.actions.remove(handle) else {
            return;
        };

        // swap the last cached action into the hole
        let index = action.cache_index;
        self.action_order.swap_remove(index);
        if let Some(&moved) = self.action_order.get(index)
            && let Some(moved) = self.actions.get_mut(moved)
        {
            moved.cache_index = index;
        }

        let clip_uuid = action.clip().uuid();
        let root = action.root();
        if let Some(by_root) = self.actions_by_clip.get_mut(&clip_uuid) {
            by_root.remove(&(root, action.blend_mode()));
            if by_root.is_empty() {
                self.actions_by_clip.remove(&clip_uuid);
            }
        }

        for key in action.bindings {
            let Some(mixer) = self.bindings.get_mut(key) else {
                continue;
            };
            mixer.reference_count = mixer.reference_count.saturating_sub(1);
            if mixer.reference_count == 0 {
                if let Some(by_name) = self.bindings_by_root.get_mut(&root) {
                    by_name.retain(|_, k| *k != key);
                    if by_name.is_empty() {
                        self.bindings_by_root.remove(&root);
                    }
                }
                self.remove_binding(key);
            }
        }
    }

    /// Removes an inactive binding.
    fn remove_binding(&mut self, key: BindingKey) {
        let Some(mixer) = self.bindings.get(key) else {
            return;
        };
        if mixer.use_count > 0 {
            // still written by an active action on another path; move it out
            // of the active prefix first
            take_back(&mut self.binding_order, &mut self.n_active_bindings, &mut self.bindings, key);
        }
        let Some(mixer) = self.bindings.remove(key) else {
            return;
        };

        let index = mixer.cache_index;
        self.binding_order.swap_remove(index);
        if let Some(&moved) = self.binding_order.get(index)
            && let Some(moved) = self.bindings.get_mut(moved)
        {
            moved.cache_index = index;
        }
    }

    // ========================================================================
    // Statistics
    // ========================================================================

    #[must_use]
    pub fn stats(&self) -> MixerStats {
        MixerStats {
            actions: PoolStats {
                total: self.actions.len(),
                in_use: self.n_active_actions,
            },
            bindings: PoolStats {
                total: self.bindings.len(),
                in_use: self.n_active_bindings,
            },
        }
    }
}

// ============================================================================
// Active-prefix bookkeeping
// ============================================================================

/// Pool entries that remember their position in an order vector.
trait CacheIndexed {
    fn cache_index_mut(&mut self) -> &mut usize;
}

impl CacheIndexed for AnimationAction {
    fn cache_index_mut(&mut self) -> &mut usize {
        &mut self.cache_index
    }
}

impl CacheIndexed for PropertyMixer {
    fn cache_index_mut(&mut self) -> &mut usize {
        &mut self.cache_index
    }
}

/// Swaps `order[a]` and `order[b]` and fixes both entries' cache indices.
fn swap_entries<K: Key, V: CacheIndexed>(order: &mut [K], pool: &mut SlotMap<K, V>, a: usize, b: usize) {
    order.swap(a, b);
    if let Some(entry) = pool.get_mut(order[a]) {
        *entry.cache_index_mut() = a;
    }
    if let Some(entry) = pool.get_mut(order[b]) {
        *entry.cache_index_mut() = b;
    }
}

/// Moves `key` to the end of the active prefix of `order`.
fn lend<K: Key, V: CacheIndexed>(order: &mut [K], n_active: &mut usize, pool: &mut SlotMap<K, V>, key: K) {
    let Some(entry) = pool.get_mut(key) else {
        return;
    };
    let index = *entry.cache_index_mut();
    if index < *n_active {
        return;
    }
    swap_entries(order, pool, index, *n_active);
    *n_active += 1;
}

/// Moves `key` to the start of the inactive suffix of `order`.
fn take_back<K: Key, V: CacheIndexed>(order: &mut [K], n_active: &mut usize, pool: &mut SlotMap<K, V>, key: K) {
    let Some(entry) = pool.get_mut(key) else {
        return;
    };
    let index = *entry.cache_index_mut();
    if index >= *n_active {
        return;
    }
    *n_active -= 1;
    swap_entries(order, pool, index, *n_active);
}
