//! particle drop: throttled position samples for the map trail
//!
//! a position is dropped when it is the first one, or when BOTH at least
//! `min_interval_ms` passed and it moved at least `min_distance_m` since the
//! last drop. dropped particles expire after `ttl_ms`.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::geo::{haversine_m, GeoPoint};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrailPolicy {
    pub min_interval_ms: i64,
    pub min_distance_m: f64,
    pub ttl_ms: i64,
}

impl Default for TrailPolicy {
    fn default() -> Self {
        Self { min_interval_ms: 5_000, min_distance_m: 5.0, ttl_ms: 120_000 }
    }
}

#[derive(Clone, Debug)]
pub struct ParticleSampler {
    min_interval_ms: i64,
    min_distance_m: f64,
    last_drop: Option<(i64, GeoPoint)>,
}

impl ParticleSampler {
    pub fn new(policy: &TrailPolicy) -> Self {
        Self {
            min_interval_ms: policy.min_interval_ms,
            min_distance_m: policy.min_distance_m,
            last_drop: None,
        }
    }

    /// true when `point` should be dropped; updates the gate state if so
    pub fn offer(&mut self, point: GeoPoint, now_ms: i64) -> bool {
        let drop = match self.last_drop {
            None => true,
            Some((at, last)) => {
                now_ms - at >= self.min_interval_ms && haversine_m(last, point) >= self.min_distance_m
            }
        };
        if drop {
            self.last_drop = Some((now_ms, point));
        }
        drop
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Particle {
    pub position: GeoPoint,
    pub pm25: f64,
    pub dropped_at: i64,
    pub expires_at: i64,
}

/// sampler plus the live particles it produced
#[derive(Clone, Debug)]
pub struct ParticleTrail {
    sampler: ParticleSampler,
    ttl_ms: i64,
    particles: VecDeque<Particle>,
}

impl ParticleTrail {
    pub fn new(policy: &TrailPolicy) -> Self {
        Self {
            sampler: ParticleSampler::new(policy),
            ttl_ms: policy.ttl_ms,
            particles: VecDeque::new(),
        }
    }

    /// offer a position; returns true when a particle was dropped
    pub fn record(&mut self, position: GeoPoint, pm25: f64, now_ms: i64) -> bool {
        if !self.sampler.offer(position, now_ms) {
            return false;
        }
        self.particles.push_back(Particle {
            position,
            pm25,
            dropped_at: now_ms,
            expires_at: now_ms + self.ttl_ms,
        });
        true
    }

    /// discard expired particles, returns how many were removed
    pub fn prune(&mut self, now_ms: i64) -> usize {
        let before = self.particles.len();
        // drop order == expiry order, so expired ones are always at the front
        while self.particles.front().is_some_and(|p| p.expires_at <= now_ms) {
            self.particles.pop_front();
        }
        before - self.particles.len()
    }

    pub fn particles(&self) -> impl Iterator<Item = &Particle> {
        self.particles.iter()
    }

    pub fn len(&self) -> usize {
        self.particles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.particles.is_empty()
    }
}
