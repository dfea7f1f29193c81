//! End-to-end workflows exercising the public surface: table workspaces,
//! event workspaces, histogram rebinning, and the shape-operation algebra.

use approx::assert_relative_eq;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rstest::rstest;

use datacube::{
    concatenate, coord, data, dataset, rebin, slice_range, split, Dataset, DataTag, Dim,
    Dimensions, Error, LinearView, Tag, Variable,
};

fn dims(pairs: &[(Dim, usize)]) -> Dimensions {
    Dimensions::new(pairs).unwrap()
}

// =============================================================================
// Table workspaces
// =============================================================================

#[test]
fn sort_table_by_column() {
    let mut table = Dataset::new();
    table
        .insert_coord::<coord::RowLabel>(
            dims(&[(Dim::Row, 3)]),
            vec!["a".into(), "b".into(), "c".into()],
        )
        .unwrap();
    table
        .insert_data::<data::Value>("data", dims(&[(Dim::Row, 3)]), vec![1.0, -2.0, 3.0])
        .unwrap();
    table
        .insert_data::<data::Str>(
            "comment",
            dims(&[(Dim::Row, 3)]),
            vec![String::new(), String::new(), String::new()],
        )
        .unwrap();

    // Flag negative entries through joint iteration.
    {
        use datacube::{DatasetView, Read};
        let mut view =
            DatasetView::<(Read<data::Value>, data::Str)>::new(&mut table).unwrap();
        view.for_each(|(value, comment)| {
            if *value < 0.0 {
                *comment = "why is this negative?".to_string();
            }
        });
    }

    let sorted = dataset::sort(&table, Tag::Data(DataTag::Value), "data").unwrap();
    assert_eq!(
        sorted.values::<coord::RowLabel>().unwrap(),
        &["b".to_string(), "a".to_string(), "c".to_string()]
    );
    assert_eq!(
        sorted.values_named::<data::Value>("data").unwrap(),
        &[-2.0, 1.0, 3.0]
    );
    assert_eq!(
        sorted.values_named::<data::Str>("comment").unwrap(),
        &[
            "why is this negative?".to_string(),
            String::new(),
            String::new()
        ]
    );
}

// =============================================================================
// Concatenation
// =============================================================================

#[test]
fn concatenate_along_new_dimension() {
    let a = Variable::data::<data::Value>("", dims(&[(Dim::Tof, 1)]), vec![1.0]).unwrap();
    let b = Variable::data::<data::Value>("", dims(&[(Dim::Tof, 1)]), vec![2.0]).unwrap();

    let ab = concatenate(&a, &b, Dim::Tof).unwrap();
    assert_eq!(ab.values::<data::Value>().unwrap(), &[1.0, 2.0]);
    let ba = concatenate(&b, &a, Dim::Tof).unwrap();
    assert_eq!(ba.values::<data::Value>().unwrap(), &[2.0, 1.0]);

    let abba = concatenate(&ab, &ba, Dim::Q).unwrap();
    assert_eq!(abba.dims(), &dims(&[(Dim::Q, 2), (Dim::Tof, 2)]));
    assert_eq!(abba.values::<data::Value>().unwrap(), &[1.0, 2.0, 2.0, 1.0]);
}

#[test]
fn random_slice_concat_roundtrips() {
    let mut rng = StdRng::seed_from_u64(71);
    for _ in 0..16 {
        let ny = rng.gen_range(1..5);
        let nx = rng.gen_range(2..6);
        let data: Vec<f64> = (0..ny * nx).map(|_| rng.gen_range(-10.0..10.0)).collect();
        let var =
            Variable::data::<data::Value>("v", dims(&[(Dim::Y, ny), (Dim::X, nx)]), data).unwrap();

        // slice / concatenate
        let k = rng.gen_range(0..=nx);
        let left = slice_range(&var, Dim::X, 0, k).unwrap();
        let right = slice_range(&var, Dim::X, k, nx).unwrap();
        assert_eq!(concatenate(&left, &right, Dim::X).unwrap(), var);

        // split / concatenate
        let positions: Vec<usize> = if nx > 2 { vec![1, nx - 1] } else { vec![1] };
        let parts = split(&var, Dim::X, &positions).unwrap();
        let mut joined = parts[0].clone();
        for part in &parts[1..] {
            joined = concatenate(&joined, part, Dim::X).unwrap();
        }
        assert_eq!(joined, var);
    }
}

// =============================================================================
// Broadcast and transpose arithmetic
// =============================================================================

#[test]
fn slice_broadcast_subtract() {
    let mut var = Variable::data::<data::Value>(
        "",
        dims(&[(Dim::Y, 2), (Dim::X, 2)]),
        vec![1.0, 2.0, 3.0, 4.0],
    )
    .unwrap();
    let copy = var.clone();

    var.sub_assign(copy.at(Dim::Y, 0).unwrap()).unwrap();
    assert_eq!(var.values::<data::Value>().unwrap(), &[0.0, 0.0, 2.0, 2.0]);

    var.sub_assign(copy.at(Dim::Y, 1).unwrap()).unwrap();
    assert_eq!(
        var.values::<data::Value>().unwrap(),
        &[-3.0, -4.0, -1.0, -2.0]
    );
}

#[test]
fn scalar_broadcast_reaches_every_element() {
    let mut var = Variable::data::<data::Value>(
        "",
        dims(&[(Dim::Z, 2), (Dim::Y, 2), (Dim::X, 2)]),
        vec![1.0; 8],
    )
    .unwrap();
    let scalar = Variable::data::<data::Value>("", Dimensions::empty(), vec![41.0]).unwrap();
    var.add_assign(&scalar).unwrap();
    assert_eq!(var.values::<data::Value>().unwrap(), &[42.0; 8]);
}

#[test]
fn transposed_add_equals_logical_transpose() {
    let mut rng = StdRng::seed_from_u64(7);
    let (ny, nx) = (3, 4);
    let data: Vec<f64> = (0..ny * nx).map(|_| rng.gen_range(-5.0..5.0)).collect();
    let a = Variable::data::<data::Value>("", dims(&[(Dim::Y, ny), (Dim::X, nx)]), data.clone())
        .unwrap();

    // b is a with its two dimensions swapped in storage order.
    let mut transposed = vec![0.0; ny * nx];
    for y in 0..ny {
        for x in 0..nx {
            transposed[x * ny + y] = data[y * nx + x];
        }
    }
    let b = Variable::data::<data::Value>("", dims(&[(Dim::X, nx), (Dim::Y, ny)]), transposed)
        .unwrap();

    let mut summed = a.clone();
    summed.add_assign(&b).unwrap();
    for (i, value) in summed.values::<data::Value>().unwrap().iter().enumerate() {
        assert_relative_eq!(*value, 2.0 * data[i]);
    }
}

#[rstest]
#[case(Dim::X)]
#[case(Dim::Y)]
#[case(Dim::Z)]
fn slab_writes_recompose_the_volume(#[case] dim: Dim) {
    let cube = dims(&[(Dim::X, 4), (Dim::Y, 2), (Dim::Z, 3)]);
    let parent =
        Variable::data::<data::Value>("", cube, (1..=24).map(f64::from).collect()).unwrap();
    let mut rebuilt = Variable::data_default::<data::Value>("", cube).unwrap();

    assert_ne!(parent, rebuilt);
    for index in 0..cube.size(dim).unwrap() {
        let slab = datacube::slice(&parent, dim, index).unwrap();
        rebuilt.set_slice(&slab, dim, index).unwrap();
    }
    assert_eq!(parent, rebuilt);
}

// =============================================================================
// Copy-on-write
// =============================================================================

#[test]
fn clones_snapshot_their_contents() {
    let a = Variable::data::<data::Value>("", dims(&[(Dim::X, 3)]), vec![1.0, 2.0, 3.0]).unwrap();
    let mut b = a.clone();
    b.values_mut::<data::Value>().unwrap()[1] = 9.0;
    assert_eq!(a.values::<data::Value>().unwrap(), &[1.0, 2.0, 3.0]);
    assert_eq!(b.values::<data::Value>().unwrap(), &[1.0, 9.0, 3.0]);
}

// =============================================================================
// Rebinning
// =============================================================================

#[test]
fn rebin_join_two_bins() {
    let var = Variable::data::<data::Value>("", dims(&[(Dim::X, 2)]), vec![1.0, 2.0]).unwrap();
    let old_edges =
        Variable::coord::<coord::X>(dims(&[(Dim::X, 3)]), vec![1.0, 2.0, 3.0]).unwrap();
    let new_edges = Variable::coord::<coord::X>(dims(&[(Dim::X, 2)]), vec![1.0, 3.0]).unwrap();
    let rebinned = rebin(&var, &old_edges, &new_edges).unwrap();
    assert_eq!(rebinned.values::<data::Value>().unwrap(), &[3.0]);
}

#[test]
fn rebin_conserves_totals_per_column() {
    let mut rng = StdRng::seed_from_u64(23);
    let (nspec, nbin) = (4, 16);
    let counts: Vec<f64> = (0..nspec * nbin).map(|_| rng.gen_range(0.0..100.0)).collect();
    let var = Variable::data::<data::Value>(
        "counts",
        dims(&[(Dim::Spectrum, nspec), (Dim::Tof, nbin)]),
        counts.clone(),
    )
    .unwrap();
    let old_edges = Variable::coord::<coord::Tof>(
        dims(&[(Dim::Tof, nbin + 1)]),
        (0..=nbin).map(|i| i as f64).collect(),
    )
    .unwrap();
    let new_edges = Variable::coord::<coord::Tof>(
        dims(&[(Dim::Tof, 6)]),
        vec![0.0, 1.5, 4.0, 9.0, 12.5, 16.0],
    )
    .unwrap();

    let rebinned = rebin(&var, &old_edges, &new_edges).unwrap();
    let values = rebinned.values::<data::Value>().unwrap();
    for s in 0..nspec {
        let before: f64 = counts[s * nbin..(s + 1) * nbin].iter().sum();
        let after: f64 = values[s * 5..(s + 1) * 5].iter().sum();
        assert_relative_eq!(before, after, max_relative = 1e-10);
    }
}

// =============================================================================
// Event workspaces
// =============================================================================

fn event_list(n: usize) -> Dataset {
    let mut e = Dataset::new();
    e.insert_data::<data::Tof>("", dims(&[(Dim::Event, n)]), vec![1.0; n])
        .unwrap();
    e.insert_data::<data::PulseTime>("", dims(&[(Dim::Event, n)]), vec![2.0; n])
        .unwrap();
    e
}

fn event_workspace() -> Dataset {
    let mut d = Dataset::new();
    d.insert_data::<data::Events>(
        "",
        dims(&[(Dim::Spectrum, 2)]),
        vec![event_list(10), event_list(20)],
    )
    .unwrap();
    d
}

#[test]
fn event_plus_concatenates_lists() {
    let d = event_workspace();

    let mut sum = d.clone();
    sum.add_assign(&d).unwrap();
    {
        let lists = sum.values::<data::Events>().unwrap();
        assert_eq!(lists[0].values::<data::Tof>().unwrap().len(), 20);
        assert_eq!(lists[1].values::<data::Tof>().unwrap().len(), 40);
    }

    sum.add_assign(&d).unwrap();
    let lists = sum.values::<data::Events>().unwrap();
    assert_eq!(lists[0].values::<data::Tof>().unwrap().len(), 30);
    assert_eq!(lists[1].values::<data::Tof>().unwrap().len(), 60);
}

#[test]
fn event_minus_and_times_are_unsupported() {
    let d = event_workspace();
    let mut lhs = d.clone();
    assert!(matches!(
        lhs.sub_assign(&d).unwrap_err(),
        Error::EventsArithmeticUnsupported { .. }
    ));
    let mut lhs = d.clone();
    assert!(matches!(
        lhs.mul_assign(&d).unwrap_err(),
        Error::EventsArithmeticUnsupported { .. }
    ));
}

#[test]
fn event_lists_are_editable_in_place() {
    let mut d = event_workspace();
    for list in d.values_mut::<data::Events>().unwrap() {
        list.erase(Tag::Data(DataTag::PulseTime), "").unwrap();
    }
    for list in d.values::<data::Events>().unwrap() {
        assert!(!list.contains(Tag::Data(DataTag::PulseTime), ""));
        assert!(list.contains(Tag::Data(DataTag::Tof), ""));
    }
    d.erase_unique(Tag::Data(DataTag::Events)).unwrap();
    assert!(d.is_empty());
}

// =============================================================================
// Linear views
// =============================================================================

#[test]
fn linear_view_push_back_from_empty() {
    let mut d = Dataset::new();
    d.insert_coord_default::<coord::X>(Dimensions::one(Dim::X, 0))
        .unwrap();
    d.insert_data_default::<data::Value>("", Dimensions::one(Dim::X, 0))
        .unwrap();
    {
        let mut view = LinearView::<(coord::X, data::Value)>::new(&mut d).unwrap();
        view.push_back((1.1, 1.2)).unwrap();
        view.push_back((2.2, 2.3)).unwrap();
    }
    assert_eq!(d.values::<coord::X>().unwrap(), &[1.1, 2.2]);
    assert_eq!(d.values::<data::Value>().unwrap(), &[1.2, 2.3]);
    assert_eq!(d.dims().size(Dim::X).unwrap(), 2);
    for var in &d {
        assert_eq!(var.dims().size(Dim::X).unwrap(), 2);
    }
}

// =============================================================================
// Dataset slicing round trips
// =============================================================================

#[test]
fn dataset_split_concat_roundtrip() {
    let mut d = Dataset::new();
    d.insert_coord::<coord::X>(dims(&[(Dim::X, 6)]), (0..6).map(f64::from).collect())
        .unwrap();
    d.insert_data::<data::Value>("v", dims(&[(Dim::X, 6)]), (10..16).map(f64::from).collect())
        .unwrap();

    let parts = dataset::split(&d, Dim::X, &[2, 4]).unwrap();
    assert_eq!(parts.len(), 3);
    let mut joined = parts[0].clone();
    for part in &parts[1..] {
        joined = dataset::concatenate(&joined, part, Dim::X).unwrap();
    }
    assert_eq!(joined, d);
}
