//! Per-offer resource bookkeeping.
//!
//! A [`ResourcePool`] copies an offer's resources into three buckets:
//! - **reserved**: keyed by `(name, resource_id)`, one entry per reservation
//! - **unreserved merged**: keyed by role then name, values summed or unioned
//! - **unreserved atomic**: whole MOUNT disks that can only be taken entire
//!
//! Consumption moves quantity out of a bucket and hands it to the caller.
//! Insufficiency is `None`, never an error. A pool lives for exactly one
//! (requirement, offer) trial and is never shared across threads.

use std::collections::BTreeMap;

use offerfit_core::{Offer, Resource, Value};
use tracing::{debug, warn};

#[derive(Debug, Clone, Default)]
pub struct ResourcePool {
    offer_id: String,
    reserved: BTreeMap<(String, String), Resource>,
    unreserved_merged: BTreeMap<String, BTreeMap<String, Value>>,
    unreserved_atomic: BTreeMap<String, Vec<Resource>>,
}

impl ResourcePool {
    /// Build a pool from an offer. The offer itself is left untouched.
    pub fn new(offer: &Offer) -> Self {
        Self::from_resources(&offer.id, &offer.resources)
    }

    fn from_resources(offer_id: &str, resources: &[Resource]) -> Self {
        let mut pool = Self {
            offer_id: offer_id.to_string(),
            ..Default::default()
        };
        for resource in resources {
            pool.release(resource.clone());
        }
        pool
    }

    pub fn offer_id(&self) -> &str {
        &self.offer_id
    }

    /// Peek at a reserved entry without consuming it.
    pub fn reserved(&self, name: &str, resource_id: &str) -> Option<&Resource> {
        self.reserved
            .get(&(name.to_string(), resource_id.to_string()))
    }

    /// Take up to `desired` from the reservation `resource_id`.
    ///
    /// The returned resource is trimmed to `desired`; anything left over
    /// stays in the pool under the same key.
    pub fn consume_reserved(
        &mut self,
        name: &str,
        desired: &Value,
        resource_id: &str,
    ) -> Option<Resource> {
        let key = (name.to_string(), resource_id.to_string());
        let held = self.reserved.get(&key)?;
        let taken = match held.value.intersect(desired) {
            Ok(v) => v,
            Err(e) => {
                warn!(offer = %self.offer_id, resource = name, error = %e, "reserved value mismatch");
                return None;
            }
        };
        let remainder = held.value.subtract(&taken).ok()?;
        let consumed = held.with_value(taken);
        if remainder.is_zero() {
            self.reserved.remove(&key);
        } else if let Some(entry) = self.reserved.get_mut(&key) {
            entry.value = remainder;
        }
        debug!(offer = %self.offer_id, resource = name, resource_id, value = %consumed.value, "consumed reserved");
        Some(consumed)
    }

    /// Take exactly `desired` from the unreserved capacity of `role`.
    pub fn consume_reservable_merged(
        &mut self,
        name: &str,
        desired: &Value,
        role: &str,
    ) -> Option<Resource> {
        let bucket = self.unreserved_merged.get_mut(role)?;
        let available = bucket.get(name)?;
        if !available.covers(desired).unwrap_or(false) {
            debug!(
                offer = %self.offer_id,
                resource = name,
                role,
                available = %available,
                desired = %desired,
                "insufficient unreserved"
            );
            return None;
        }
        let remaining = available.subtract(desired).ok()?;
        if remaining.is_zero() {
            bucket.remove(name);
        } else {
            bucket.insert(name.to_string(), remaining);
        }
        Some(Resource::new(name, desired.clone()).with_role(role))
    }

    /// Take a whole unreserved MOUNT disk holding at least `desired`.
    ///
    /// With `root` set, only disks mounted at that root qualify.
    pub fn consume_atomic(
        &mut self,
        name: &str,
        desired: &Value,
        root: Option<&str>,
    ) -> Option<Resource> {
        let disks = self.unreserved_atomic.get_mut(name)?;
        let pos = disks.iter().position(|d| {
            d.value.covers(desired).unwrap_or(false)
                && root.is_none_or(|r| d.mount_root() == Some(r))
        })?;
        let disk = disks.remove(pos);
        if disks.is_empty() {
            self.unreserved_atomic.remove(name);
        }
        Some(disk)
    }

    /// Return a resource to the bucket it belongs in.
    pub fn release(&mut self, resource: Resource) {
        if let Some(id) = resource.resource_id() {
            let key = (resource.name.clone(), id.to_string());
            match self.reserved.get_mut(&key) {
                Some(existing) => match existing.value.add(&resource.value) {
                    Ok(sum) => existing.value = sum,
                    Err(e) => warn!(resource = %resource.name, error = %e, "dropping mismatched reserved value"),
                },
                None => {
                    self.reserved.insert(key, resource);
                }
            }
        } else if resource.is_mount_disk() {
            self.unreserved_atomic
                .entry(resource.name.clone())
                .or_default()
                .push(resource);
        } else {
            let bucket = self.unreserved_merged.entry(resource.role.clone()).or_default();
            let merged = match bucket.remove(&resource.name) {
                Some(existing) => match existing.add(&resource.value) {
                    Ok(sum) => sum,
                    Err(e) => {
                        warn!(resource = %resource.name, error = %e, "dropping mismatched unreserved value");
                        existing
                    }
                },
                None => resource.value,
            };
            bucket.insert(resource.name, merged);
        }
    }

    /// Narrow the pool to `resources`. Never adds capacity.
    pub fn retain(&mut self, resources: &[Resource]) {
        let allowed = Self::from_resources(&self.offer_id, resources);

        self.reserved.retain(|key, held| match allowed.reserved.get(key) {
            Some(a) => match held.value.intersect(&a.value) {
                Ok(v) if !v.is_zero() => {
                    held.value = v;
                    true
                }
                _ => false,
            },
            None => false,
        });

        for (role, bucket) in self.unreserved_merged.iter_mut() {
            bucket.retain(|name, value| {
                match allowed.unreserved_merged.get(role).and_then(|b| b.get(name)) {
                    Some(a) => match value.intersect(a) {
                        Ok(v) if !v.is_zero() => {
                            *value = v;
                            true
                        }
                        _ => false,
                    },
                    None => false,
                }
            });
        }
        self.unreserved_merged.retain(|_, bucket| !bucket.is_empty());

        for (name, disks) in self.unreserved_atomic.iter_mut() {
            let keep = allowed.unreserved_atomic.get(name);
            disks.retain(|d| keep.is_some_and(|k| k.contains(d)));
        }
        self.unreserved_atomic.retain(|_, disks| !disks.is_empty());
    }

    /// Remaining unreserved capacity of `name` in `role`.
    pub fn unreserved_value(&self, name: &str, role: &str) -> Option<&Value> {
        self.unreserved_merged.get(role)?.get(name)
    }

    /// Reserved entries still in the pool.
    pub fn reserved_resources(&self) -> impl Iterator<Item = &Resource> {
        self.reserved.values()
    }

    pub fn atomic_resources(&self, name: &str) -> &[Resource] {
        self.unreserved_atomic
            .get(name)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }
}
