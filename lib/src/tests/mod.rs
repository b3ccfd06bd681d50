/*! End-to-end tests. */
use std::io::Write;

use pretty_assertions::assert_eq;
use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::{
    load_config_from_file, register_all, BitRange, Hit, MatchMode,
    PatternPool, Registry, Repeat, Subject, Uniformity,
};

macro_rules! test_recognition {
    ($registry:expr, $subject:expr, $expected:expr) => {{
        let registry = &$registry;
        let subject = $subject;

        let name = registry
            .of(&subject, BitRange::full(), None)
            .expect("recognition should not fail")
            .map(|id| registry.get(id).unwrap().name());

        assert_eq!(
            name, $expected,
            "\n\n{:?} should be recognized as {:?}, but it is {:?}",
            subject, $expected, name
        );
    }};
}

macro_rules! contents_are {
    ($registry:expr, $data:expr, $expected:literal) => {{
        test_recognition!(
            $registry,
            Subject::new().with_bytes($data),
            Some($expected)
        );
    }};
}

macro_rules! contents_unknown {
    ($registry:expr, $data:expr) => {{
        test_recognition!(
            $registry,
            Subject::new().with_bytes($data),
            None::<&str>
        );
    }};
}

macro_rules! name_is {
    ($registry:expr, $path:literal, $expected:literal) => {{
        test_recognition!(
            $registry,
            Subject::new().with_path($path),
            Some($expected)
        );
    }};
}

macro_rules! name_unknown {
    ($registry:expr, $path:literal) => {{
        test_recognition!(
            $registry,
            Subject::new().with_path($path),
            None::<&str>
        );
    }};
}

#[test]
fn contents() {
    let registry = Registry::with_builtin_types().unwrap();

    contents_are!(registry, b"\x1f\x8b\x08\x00\x00\x00", "gzip");
    contents_are!(registry, b"\x1f\x9d\x90", "compress");
    contents_are!(registry, b"BZh91AY&SY", "bzip2");
    contents_are!(registry, b"\xfd7zXZ\x00\x00", "xz");
    contents_are!(registry, b"\x5d\x00\x00\x80\x00", "lzma");
    contents_are!(registry, b"PK\x03\x04\x14\x00", "zip");
    contents_are!(registry, b"\x89PNG\r\n\x1a\n\x00\x00", "png");
    contents_are!(registry, b"\xff\xd8\xff\xe0", "jpeg");
    contents_are!(registry, b"GIF87a", "gif");
    contents_are!(registry, b"GIF89a", "gif");
    contents_are!(registry, b"\x7fELF\x01\x02\x01", "elf");
    contents_are!(registry, b"#!/usr/bin/python\n", "python");
    contents_are!(registry, b"#!/bin/bash\n", "shell");

    contents_unknown!(registry, b"");
    contents_unknown!(registry, b"\x1f");
    contents_unknown!(registry, b"GIF88a");
    contents_unknown!(registry, b"\x7fELF\x03\x01");
    contents_unknown!(registry, b"\x00\x1f\x8b");
    contents_unknown!(registry, b"hello world");

    let mut tar = vec![0_u8; 1024];
    tar[257..265].copy_from_slice(b"ustar  \x00");
    contents_are!(registry, &tar, "tar");

    // The magic number must be at the right offset.
    tar.insert(0, 0);
    contents_unknown!(registry, &tar);
}

#[test]
fn names() {
    let registry = Registry::with_builtin_types().unwrap();

    name_is!(registry, "main.c", "c");
    name_is!(registry, "include/stdio.h", "c");
    name_is!(registry, "/src/lib.cc", "c++");
    name_is!(registry, "vector.hpp", "c++");
    name_is!(registry, "a.c++", "c++");
    name_is!(registry, "setup.py", "python");
    name_is!(registry, "configure.sh", "shell");
    name_is!(registry, "Makefile", "makefile");
    name_is!(registry, "build/MAKEFILE", "makefile");

    name_unknown!(registry, "main.cs");
    name_unknown!(registry, "c");
    name_unknown!(registry, "Makefile.am");
    name_unknown!(registry, "src.c/README");
}

#[test]
fn date_pattern() {
    let mut pool = PatternPool::new();

    let digit = pool.digit().unwrap();
    let year = pool.rep(digit, Repeat::exactly(4)).unwrap();
    let two = pool.rep(digit, Repeat::exactly(2)).unwrap();
    let dash = pool.lit(b"-").unwrap();
    let date = pool.seq(&[year, dash, two, dash, two]).unwrap();
    pool.retain(date).unwrap();

    let text = b"released on 2024-03-17, fixed 2024-3-18";

    assert_eq!(
        pool.match_in(date, text, BitRange::full(), MatchMode::Partial),
        Some(Hit::new(12 * 8, 80))
    );
    assert_eq!(
        pool.match_in(
            date,
            text,
            BitRange::new(13 * 8, crate::INF),
            MatchMode::Partial
        ),
        None
    );

    assert_eq!(pool.sample_range(date), BitRange::fixed(80));
    assert_eq!(pool.uniformity(date), Uniformity::Size);
    assert_eq!(pool.complexity(date, BitRange::full()), 100_000_000);

    let mut rng = StdRng::seed_from_u64(3);
    assert_eq!(pool.self_check(date, 32, &mut rng), Ok(()));

    let canonical = pool.canonicalize(date).unwrap();
    assert_eq!(
        pool.match_in(canonical, text, BitRange::full(), MatchMode::Partial),
        Some(Hit::new(12 * 8, 80))
    );
}

#[test]
fn configured_registry() {
    let mut config_file = tempfile::NamedTempFile::new().unwrap();
    write!(
        config_file,
        "[content]\nuse_mmap = false\nmode = \"anchored\"\n\n\
         [self_check]\ninstances = 4\nseed = 1234\n"
    )
    .unwrap();

    let config = load_config_from_file(config_file.path()).unwrap();

    assert!(!config.content.use_mmap);
    assert_eq!(config.content.mode, MatchMode::Anchored);
    assert_eq!(config.self_check.instances, 4);

    let mut registry = Registry::with_config(config);
    register_all(&mut registry).unwrap();
    assert_eq!(registry.self_check(), Ok(()));

    let png = file_with(b"\x89PNG\r\n\x1a\n");
    test_recognition!(
        registry,
        Subject::new().with_file(png.as_file(), None),
        Some("png")
    );

    // Contents come first, the name decides when they are unknown.
    let source = file_with(b"int main;");
    test_recognition!(
        registry,
        Subject::new().with_path("foo.c").with_file(png.as_file(), None),
        Some("png")
    );
    test_recognition!(
        registry,
        Subject::new()
            .with_path("foo.c")
            .with_file(source.as_file(), None),
        Some("c")
    );

    // In anchored mode the magic number must be at the start of the file.
    let late = file_with(b"\x00\x89PNG\r\n\x1a\n");
    test_recognition!(
        registry,
        Subject::new().with_file(late.as_file(), None),
        None::<&str>
    );
}

#[test]
fn large_file() {
    let registry = Registry::with_builtin_types().unwrap();

    let mut contents = vec![0_u8; 1 << 20];
    contents[..8].copy_from_slice(b"\x89PNG\r\n\x1a\n");
    let data = file_with(&contents);

    test_recognition!(
        registry,
        Subject::new().with_file(data.as_file(), None),
        Some("png")
    );

    // Only the bytes within the given size are taken into account.
    test_recognition!(
        registry,
        Subject::new().with_file(data.as_file(), Some(4)),
        None::<&str>
    );
}

fn file_with(contents: &[u8]) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(contents).unwrap();
    file.flush().unwrap();
    file
}
