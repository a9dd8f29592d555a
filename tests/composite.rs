mod common;

use hair_splat_editor::{CompositeBuffer, Error, glam::*};

use common::given;

#[test]
fn test_composite_buffer_register_should_tile_windows_in_registration_order() {
    let mut buffer = CompositeBuffer::new();

    let first = buffer
        .register(&given::point_cloud(100, -1.0, 1.0))
        .expect("register");
    let second = buffer
        .register(&given::point_cloud(50, 2.0, 3.0))
        .expect("register");

    assert_eq!(first, 0);
    assert_eq!(second, 1);
    assert_eq!(buffer.len(), 150);
    assert_eq!(buffer.window(0), Some(0..100));
    assert_eq!(buffer.window(1), Some(100..150));
    assert_eq!(
        buffer.windows().iter().map(|w| w.len()).sum::<usize>(),
        buffer.len()
    );
}

#[test]
fn test_composite_buffer_register_when_windows_are_many_should_keep_them_disjoint() {
    let mut buffer = CompositeBuffer::new();
    for count in [3, 1, 7, 2, 5] {
        buffer
            .register(&given::point_cloud(count, 0.0, 1.0))
            .expect("register");
    }

    let windows = buffer.windows();
    assert_eq!(windows[0].start, 0);
    for pair in windows.windows(2) {
        assert_eq!(pair[0].end, pair[1].start);
    }
    assert_eq!(windows.last().map(|w| w.end), Some(buffer.len()));
}

#[test]
fn test_composite_buffer_register_when_row_counts_differ_should_fail() {
    let mut buffer = CompositeBuffer::new();
    buffer
        .register(&given::point_cloud(4, 0.0, 1.0))
        .expect("register");

    let mut gaussians = given::point_cloud(3, 0.0, 1.0);
    gaussians.opacity.push(1.0);

    let result = buffer.register(&gaussians);

    assert!(matches!(
        result,
        Err(Error::RowCountMismatch {
            column: "opacity",
            expected: 3,
            actual: 4,
        })
    ));
    assert_eq!(buffer.len(), 4);
    assert_eq!(buffer.window_count(), 1);
}

#[test]
fn test_composite_buffer_view_mut_should_only_write_inside_window() {
    let mut buffer = CompositeBuffer::new();
    buffer
        .register(&given::point_cloud(10, 0.0, 1.0))
        .expect("register");
    buffer
        .register(&given::point_cloud(5, 2.0, 3.0))
        .expect("register");

    let mut view = buffer.view_mut(1).expect("view");
    view.opacity.fill(0.0);
    view.pos.iter_mut().for_each(|p| *p = Vec3::ONE);

    let all = buffer.gaussians();
    assert!(all.opacity[..10].iter().all(|o| *o == 0.9));
    assert!(all.opacity[10..].iter().all(|o| *o == 0.0));
    assert!(all.pos[..10].iter().all(|p| *p != Vec3::ONE));
}

#[test]
fn test_composite_buffer_view_when_index_out_of_range_should_fail() {
    let mut buffer = CompositeBuffer::new();
    buffer
        .register(&given::point_cloud(2, 0.0, 1.0))
        .expect("register");

    assert!(matches!(buffer.view(1), Err(Error::AvatarNotFound(1))));
    assert!(matches!(buffer.view_mut(3), Err(Error::AvatarNotFound(3))));
    assert_eq!(buffer.window(1), None);
}

#[test]
fn test_scene_insert_avatar_should_write_record_into_window() {
    let scene = given::scene(2);

    assert_eq!(scene.buffer().len(), 2 * given::GAUSSIAN_COUNT);
    assert_eq!(
        scene.buffer().window(1),
        Some(given::GAUSSIAN_COUNT..2 * given::GAUSSIAN_COUNT)
    );

    let record = &scene.avatars()[0];
    let window = scene.buffer().view(0).expect("view");
    assert_eq!(window.pos, record.gaussians.pos.as_slice());
    assert_eq!(window.opacity, record.gaussians.opacity.as_slice());
    assert_eq!(window.sh, record.gaussians.sh.as_slice());
}

#[test]
fn test_scene_insert_avatar_should_displace_second_avatar_window() {
    let scene = given::scene(2);

    let displacement = scene.displacement(1);
    let record = &scene.avatars()[1];
    let window = scene.buffer().view(1).expect("view");

    // Both avatars span X in [0, 0.3].
    assert!((displacement - 0.4).abs() < 1e-6);
    for (placed, local) in window.pos.iter().zip(&record.gaussians.pos) {
        given::assert_vec3_near(*placed, *local + Vec3::X * displacement);
    }
}
