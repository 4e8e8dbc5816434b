use horizon_geom::{ChunkPos, Vec3, disk_offsets};
use proptest::num::f32::NORMAL;
use proptest::prelude::*;

fn approx_zero_scaled(val: f32, scale: f32, atol: f32, rtol: f32) -> bool {
    val.abs() <= atol + rtol * scale
}

fn bounded_nonzero_f32() -> impl Strategy<Value = f32> {
    NORMAL.prop_filter("bounded_nonzero", |v| {
        let a = v.abs();
        a.is_finite() && (1e-3..=1e4).contains(&a)
    })
}

fn arb_vec3() -> impl Strategy<Value = Vec3> {
    (bounded_nonzero_f32(), bounded_nonzero_f32(), bounded_nonzero_f32())
        .prop_map(|(x, y, z)| Vec3::new(x, y, z))
}

proptest! {
    // a·(a×b) = 0 and b·(a×b) = 0
    #[test]
    fn cross_is_orthogonal(a in arb_vec3(), b in arb_vec3()) {
        let c = a.cross(b);
        prop_assert!(approx_zero_scaled(a.dot(c), a.length() * c.length(), 1e-6, 1e-4));
        prop_assert!(approx_zero_scaled(b.dot(c), b.length() * c.length(), 1e-6, 1e-4));
    }

    #[test]
    fn normalized_has_unit_length(v in arb_vec3()) {
        prop_assert!((v.normalized().length() - 1.0).abs() <= 1e-4);
    }

    // Every offset in the disk is within radius and every in-radius offset is present
    #[test]
    fn disk_offsets_match_euclidean_radius(radius in 0u32..=12) {
        let offs: Vec<ChunkPos> = disk_offsets(radius).collect();
        let r = radius as i32;
        let mut expected = 0usize;
        for y in -r..=r {
            for x in -r..=r {
                let p = ChunkPos::new(x, y);
                let inside = p.length() <= radius as f32;
                prop_assert_eq!(offs.contains(&p), inside);
                if inside { expected += 1; }
            }
        }
        prop_assert_eq!(offs.len(), expected);
    }

    #[test]
    fn distance_is_symmetric(ax in -1000i32..1000, ay in -1000i32..1000, bx in -1000i32..1000, by in -1000i32..1000) {
        let a = ChunkPos::new(ax, ay);
        let b = ChunkPos::new(bx, by);
        prop_assert_eq!(a.distance(b), b.distance(a));
    }
}
