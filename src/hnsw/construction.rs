//! HNSW graph construction: insertion, level assignment, degree shrinking.

use rand::rngs::StdRng;
use rand::Rng;

use crate::distance::stored_distance;
use crate::error::Result;
use crate::hnsw::search::search_layer;
use crate::hnsw::{HnswIndex, MAX_LAYERS};
use crate::matrix::Matrix;
use crate::topk::Neighbor;

impl HnswIndex {
    /// Draw the top layer for a new element: `floor(-ln(u) * level_norm)`
    /// with `u` uniform in (0, 1], clamped to the fixed layer range. The
    /// resulting geometric occupancy keeps the hierarchy O(log N) deep with
    /// high probability.
    pub(crate) fn random_level(&self, rng: &mut StdRng) -> i32 {
        let u: f64 = 1.0 - rng.random::<f64>();
        let level = (-u.ln() * self.level_norm) as i32;
        level.min(MAX_LAYERS as i32 - 1)
    }

    /// Insert point `index` into every layer up to its drawn level.
    ///
    /// Follows the HNSW paper (Malkov & Yashunin, 2018): greedy ef=1 descent
    /// from the entry point down to the element's level, then an
    /// `ef_construction` search per layer from there to the bottom, linking to
    /// the M closest results and carrying the widened frontier downwards.
    pub(crate) fn insert(&mut self, data: &Matrix, rng: &mut StdRng, index: u32) -> Result<()> {
        let level = self.random_level(rng);
        self.element_levels[index as usize] = level;
        for l in 0..=level {
            self.layers[l as usize].insert_vertex(index);
        }

        // First insertion initializes the entry point.
        if self.max_level < 0 {
            self.max_level = level;
            self.entry_point = index;
            return Ok(());
        }

        let query = data.row(index as usize);
        let mut ep: Vec<u32> = vec![self.entry_point];

        // Descend without linking, refining the entry point only.
        let mut cursor = self.max_level;
        while cursor > level {
            let w = search_layer(
                data,
                &self.layers[cursor as usize],
                self.metric,
                query,
                &ep,
                1,
            )?;
            if let Some(best) = w.first() {
                ep = vec![best.index];
            }
            cursor -= 1;
        }

        // Link on every layer the element belongs to.
        let mut lc = level.min(self.max_level);
        while lc >= 0 {
            let w = search_layer(
                data,
                &self.layers[lc as usize],
                self.metric,
                query,
                &ep,
                self.params.ef_construction,
            )?;

            let chosen: Vec<u32> = w.iter().take(self.params.m).map(|n| n.index).collect();
            for &neighbor in &chosen {
                self.layers[lc as usize].insert_edge(index, neighbor);
            }

            // Re-linking may have pushed a neighbor over the layer's degree
            // capacity; shrink it back down.
            let cap = if lc == 0 { self.m_max0 } else { self.params.m };
            for &neighbor in &chosen {
                if self.layers[lc as usize].neighbors(neighbor)?.len() > cap {
                    self.shrink_connections(data, neighbor, lc as usize, cap)?;
                }
            }

            // The widened frontier seeds the next lower layer.
            ep = w.iter().map(|n| n.index).collect();
            lc -= 1;
        }

        if level > self.max_level {
            self.max_level = level;
            self.entry_point = index;
        }
        Ok(())
    }

    /// Keep only the `cap` closest neighbors of `vertex` on `level`, deleting
    /// the other edges. Restores the bounded-degree invariant after an insert.
    fn shrink_connections(
        &mut self,
        data: &Matrix,
        vertex: u32,
        level: usize,
        cap: usize,
    ) -> Result<()> {
        let v = data.row(vertex as usize);
        let mut ranked: Vec<Neighbor> = self.layers[level]
            .neighbors(vertex)?
            .iter()
            .map(|&n| Neighbor {
                distance: stored_distance(self.metric, v, data.row(n as usize)),
                index: n,
            })
            .collect();
        ranked.sort();

        for dropped in ranked.iter().skip(cap) {
            self.layers[level].delete_edge(vertex, dropped.index);
        }
        Ok(())
    }
}
