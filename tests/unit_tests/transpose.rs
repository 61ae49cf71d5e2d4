use adsolve::tensor::{cyclic_transpose, rotated_shape, Tensor};
use proptest::prelude::*;

fn arbitrary_tensor() -> impl Strategy<Value = Tensor> {
    prop::collection::vec(1usize..=5, 1..=3).prop_flat_map(|shape| {
        let len: usize = shape.iter().product();
        prop::collection::vec(prop::num::f64::ANY, len..=len).prop_map(move |data| {
            let mut t = Tensor::zeros(&shape);
            t.as_mut_slice().copy_from_slice(&data);
            t
        })
    })
}

proptest! {
    /// One rotation per axis must restore the original tensor bitwise.
    #[test]
    fn full_rotation_cycle_is_bitwise_identity(t in arbitrary_tensor()) {
        let original_bits: Vec<u64> = t.as_slice().iter().map(|v| v.to_bits()).collect();

        let mut current = t;
        for _ in 0..current.ndim() {
            let mut next = Tensor::zeros(&rotated_shape(current.shape()));
            cyclic_transpose(&current, &mut next);
            current = next;
        }

        let round_trip: Vec<u64> = current.as_slice().iter().map(|v| v.to_bits()).collect();
        prop_assert_eq!(round_trip, original_bits);
    }

    #[test]
    fn single_rotation_permutes_indices(t in arbitrary_tensor()) {
        let mut rotated = Tensor::zeros(&rotated_shape(t.shape()));
        cyclic_transpose(&t, &mut rotated);

        // dst[i1, ..., ik, i0] = src[i0, i1, ..., ik]
        let shape = t.shape().to_vec();
        for (k, &value) in t.as_slice().iter().enumerate() {
            let mut index = vec![0usize; shape.len()];
            let mut rem = k;
            for axis in (0..shape.len()).rev() {
                index[axis] = rem % shape[axis];
                rem /= shape[axis];
            }
            let mut rotated_index = index[1..].to_vec();
            rotated_index.push(index[0]);
            prop_assert_eq!(rotated.at(&rotated_index).to_bits(), value.to_bits());
        }
    }
}
