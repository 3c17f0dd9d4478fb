//! End-to-end tests for the Maestro reader/writer.
//!
//! Exercises the full pipeline (buffer → tokenizer → block model →
//! serializer → files) against a small structure corpus, including gzip
//! round trips and deliberately tiny parser windows.

use maestream::constants::{ATOM_BLOCK, BOND_BLOCK, CT_BLOCK, MAE_FORMAT_VERSION};
use maestream::{Block, IndexedStrategy, MaeParser, Reader, Writer};

/// Three connection-table blocks behind a version header, with quoted
/// strings, escapes, and an undefined cell.
const TEST_CORPUS: &str = r#"{
  s_m_m2io_version
  :::
  2.0.0
}

f_m_ct {
  s_m_title
  r_m_energy
  :::
  "Title with p \\ \" space"
  -11.5
  m_atom[3] {
    # First column is Index #
    i_m_atomic_number
    r_m_x_coord
    r_m_y_coord
    r_m_z_coord
    s_m_pdb_residue_name
    s_m_atom_name
    :::
    1 8 0.0 0.0 0.1167 "UNK " "Does p \" \\this work"
    2 1 0.7625 0.0 -0.4667 "UNK " H2
    3 1 -0.7625 0.0 -0.4667 "UNK " H3
    :::
  }
  m_bond[2] {
    # First column is Index #
    i_m_from
    i_m_to
    i_m_order
    :::
    1 1 2 1
    2 1 3 1
    :::
  }
}

f_m_ct {
  s_m_title
  :::
  second
  m_atom[1] {
    # First column is Index #
    i_m_atomic_number
    r_m_x_coord
    :::
    1 6 0.0
    :::
  }
  m_bond[1] {
    # First column is Index #
    i_m_from
    i_m_to
    i_m_order
    :::
    1 1 1 1
    :::
  }
}

f_m_ct {
  s_m_title
  r_m_charge
  :::
  "third structure"
  0.5
  m_atom[2] {
    # First column is Index #
    i_m_atomic_number
    r_m_x_coord
    :::
    1 7 1.25
    2 <> -1.25
    :::
  }
  m_bond[1] {
    # First column is Index #
    i_m_from
    i_m_to
    i_m_order
    :::
    1 1 2 1
    :::
  }
}
"#;

fn read_all_cts(reader: &mut Reader<impl std::io::Read>) -> Vec<Block> {
    let mut blocks = Vec::new();
    while let Some(block) = reader.next_block(CT_BLOCK).unwrap() {
        blocks.push(block);
    }
    blocks
}

#[test]
fn header_only_block() {
    let data = "{\n  s_m_m2io_version\n  :::\n  1.1.0\n}\n";
    let mut reader = Reader::new(data.as_bytes());

    let block = reader.read_block().unwrap().unwrap();
    assert_eq!(block.name(), "");
    assert_eq!(block.get_string_property(MAE_FORMAT_VERSION).unwrap(), "1.1.0");
    assert!(reader.read_block().unwrap().is_none());
}

#[test]
fn named_outer_with_nested_and_indexed_blocks() {
    let data = "{\n  s_m_m2io_version\n  :::\n  1.1.0 \n}\n\n\
                f_m_ct {\n  s_m_prop\n  :::\n  1.1.0 \n\
                \x20 m_nested[2] {\n    s_m_prop\n    :::\n    1 1.1.0 \n    2 1.1.0 \n    :::\n  }\n\
                \x20 m_bond[2] {\n    s_m_prop\n    :::\n    1 1.1.0 \n    2 1.1.0 \n    :::\n  }\n\
                \x20 m_dependencies {\n    s_m_prop\n    :::\n    1.1.0 \n  }\n}\n";

    let mut reader = Reader::new(data.as_bytes());
    let block = reader.next_block(CT_BLOCK).unwrap().unwrap();

    assert_eq!(block.get_string_property("s_m_prop").unwrap(), "1.1.0");

    let nested = block.get_indexed_block("m_nested").unwrap();
    let prop = nested.get_string_property("s_m_prop").unwrap();
    assert_eq!(prop.get(0).unwrap(), "1.1.0");
    assert_eq!(prop.get(1).unwrap(), "1.1.0");

    assert!(block.has_indexed_block("m_bond"));
    assert!(block.has_block("m_dependencies"));
    assert_eq!(
        block
            .get_block("m_dependencies")
            .unwrap()
            .get_string_property("s_m_prop")
            .unwrap(),
        "1.1.0"
    );
}

#[test]
fn quoted_strings_and_escapes() {
    let mut reader = Reader::new(TEST_CORPUS.as_bytes());
    let block = reader.next_block(CT_BLOCK).unwrap().unwrap();

    assert_eq!(
        block.get_string_property("s_m_title").unwrap(),
        r#"Title with p \ " space"#
    );

    let atoms = block.get_indexed_block(ATOM_BLOCK).unwrap();
    let residues = atoms.get_string_property("s_m_pdb_residue_name").unwrap();
    assert_eq!(residues.get(0).unwrap(), "UNK ");
    let names = atoms.get_string_property("s_m_atom_name").unwrap();
    assert_eq!(names.get(0).unwrap(), r#"Does p " \this work"#);
}

#[test]
fn null_cell_in_real_column() {
    let data = "f_m_ct {\n  s_m_title\n  :::\n  t\n  m_atom[3] {\n    r_m_x\n    :::\n    1 1.5 \n    2 <> \n    3 -2.5 \n    :::\n  }\n}\n";

    for direct in [false, true] {
        let mut reader = if direct {
            Reader::direct(data.as_bytes())
        } else {
            Reader::new(data.as_bytes())
        };
        let block = reader.next_block(CT_BLOCK).unwrap().unwrap();
        let atoms = block.get_indexed_block("m_atom").unwrap();
        let xs = atoms.get_real_property("r_m_x").unwrap();

        assert!(xs.is_defined(0));
        assert_eq!(*xs.get(0).unwrap(), 1.5);

        assert!(!xs.is_defined(1));
        assert!(xs.get(1).is_err());
        assert_eq!(*xs.get_or(1, &999.0), 999.0);

        assert!(xs.is_defined(2));
        assert_eq!(*xs.get(2).unwrap(), -2.5);
    }
}

#[test]
fn colon_bearing_property_key() {
    let data = "f_m_ct {\n  s_m_prop:name::with:::many::::colons\n  :::\n  1.1.0 \n}\n";
    let mut reader = Reader::new(data.as_bytes());
    let block = reader.next_block(CT_BLOCK).unwrap().unwrap();
    assert_eq!(
        block
            .get_string_property("s_m_prop:name::with:::many::::colons")
            .unwrap(),
        "1.1.0"
    );
}

#[test]
fn comments_between_tokens() {
    let data = "# header comment #\nf_m_ct { # one line #\n  s_m_prop\n  :::\n  # split\nacross lines #\n  value \n}\n";
    let mut reader = Reader::new(data.as_bytes());
    let block = reader.next_block(CT_BLOCK).unwrap().unwrap();
    assert_eq!(block.get_string_property("s_m_prop").unwrap(), "value");
}

#[test]
fn corpus_counts_and_bond_columns() {
    let mut reader = Reader::new(TEST_CORPUS.as_bytes());
    let blocks = read_all_cts(&mut reader);
    assert_eq!(blocks.len(), 3);

    for block in &blocks {
        let bonds = block.get_indexed_block(BOND_BLOCK).unwrap();
        let from = bonds.get_int_property("i_m_from").unwrap();
        let to = bonds.get_int_property("i_m_to").unwrap();
        assert_eq!(from.len(), to.len());
        assert_eq!(bonds.row_count(), from.len());
    }

    let third_atoms = blocks[2].get_indexed_block(ATOM_BLOCK).unwrap();
    let numbers = third_atoms.get_int_property("i_m_atomic_number").unwrap();
    assert!(numbers.is_defined(0));
    assert!(!numbers.is_defined(1));
}

#[test]
fn direct_and_buffered_strategies_agree() {
    let mut buffered = Reader::new(TEST_CORPUS.as_bytes());
    let mut direct = Reader::direct(TEST_CORPUS.as_bytes());

    let buffered_blocks = read_all_cts(&mut buffered);
    let direct_blocks = read_all_cts(&mut direct);

    assert_eq!(buffered_blocks.len(), direct_blocks.len());
    for (a, b) in buffered_blocks.iter().zip(direct_blocks.iter()) {
        assert_eq!(a, b);
    }
}

#[test]
fn tiny_parser_windows_parse_the_corpus() {
    let mut reference = Reader::new(TEST_CORPUS.as_bytes());
    let expected = read_all_cts(&mut reference);

    for window in [16, 64, 256] {
        let mut reader = Reader::with_buffer_size(TEST_CORPUS.as_bytes(), window);
        let blocks = read_all_cts(&mut reader);
        assert_eq!(blocks.len(), expected.len(), "window size {}", window);
        for (got, want) in blocks.iter().zip(expected.iter()) {
            assert_eq!(got, want, "window size {}", window);
        }
    }
}

#[test]
fn serialization_round_trips_to_equal_blocks() {
    let mut reader = Reader::new(TEST_CORPUS.as_bytes());
    let blocks = read_all_cts(&mut reader);

    for block in &blocks {
        let mut out = Vec::new();
        block.write_to(&mut out).unwrap();

        let mut parser = MaeParser::new(out.as_slice());
        let round_tripped = parser.outer_block().unwrap().unwrap();
        assert_eq!(&round_tripped, block);
    }
}

#[test]
fn serialization_is_idempotent() {
    let mut reader = Reader::new(TEST_CORPUS.as_bytes());
    let blocks = read_all_cts(&mut reader);

    for block in &blocks {
        let mut first = Vec::new();
        block.write_to(&mut first).unwrap();

        let mut parser = MaeParser::new(first.as_slice());
        let reparsed = parser.outer_block().unwrap().unwrap();
        let mut second = Vec::new();
        reparsed.write_to(&mut second).unwrap();

        assert_eq!(first, second);
    }
}

#[test]
fn write_then_read_plain_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("round_trip.mae");

    let mut reader = Reader::new(TEST_CORPUS.as_bytes());
    let originals = read_all_cts(&mut reader);
    assert_eq!(originals.len(), 3);

    let mut writer = Writer::create(&path).unwrap();
    for block in &originals {
        writer.write(block).unwrap();
    }
    writer.finish().unwrap();

    let mut reader = Reader::from_path(&path).unwrap();
    let read_back = read_all_cts(&mut reader);
    assert_eq!(read_back.len(), originals.len());
    for (got, want) in read_back.iter().zip(originals.iter()) {
        assert_eq!(got, want);
    }
}

#[cfg(feature = "compression")]
#[test]
fn write_then_read_gzip_file() {
    let dir = tempfile::tempdir().unwrap();

    for name in ["round_trip.maegz", "round_trip.mae.gz"] {
        let path = dir.path().join(name);

        let mut reader = Reader::new(TEST_CORPUS.as_bytes());
        let originals = read_all_cts(&mut reader);

        let mut writer = Writer::create(&path).unwrap();
        for block in &originals {
            writer.write(block).unwrap();
        }
        writer.finish().unwrap();

        // The file on disk must actually be gzip (magic bytes 1f 8b).
        let raw = std::fs::read(&path).unwrap();
        assert_eq!(&raw[..2], &[0x1f, 0x8b]);

        let mut reader = Reader::from_path(&path).unwrap();
        let read_back = read_all_cts(&mut reader);
        assert_eq!(read_back.len(), originals.len());
        for (got, want) in read_back.iter().zip(originals.iter()) {
            assert_eq!(got, want);
        }
    }
}

#[test]
fn written_file_carries_version_header() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("header.mae");

    let mut block = Block::new(CT_BLOCK);
    block.set_string_property("s_m_title", "only");
    let mut writer = Writer::create(&path).unwrap();
    writer.write(&block).unwrap();
    writer.finish().unwrap();

    let mut reader = Reader::from_path(&path).unwrap();
    let header = reader.read_block().unwrap().unwrap();
    assert_eq!(header.name(), "");
    assert_eq!(
        header.get_string_property(MAE_FORMAT_VERSION).unwrap(),
        "2.0.0"
    );
}

#[test]
fn filtered_reads_preserve_file_order() {
    let data = "p_m_other {\n  s_m_p\n  :::\n  skip \n}\n\nf_m_ct {\n  s_m_p\n  :::\n  one \n}\n\np_m_other {\n  s_m_p\n  :::\n  skip \n}\n\nf_m_ct {\n  s_m_p\n  :::\n  two \n}\n";
    let mut reader = Reader::new(data.as_bytes());

    let first = reader.next_block(CT_BLOCK).unwrap().unwrap();
    let second = reader.next_block(CT_BLOCK).unwrap().unwrap();
    assert_eq!(first.get_string_property("s_m_p").unwrap(), "one");
    assert_eq!(second.get_string_property("s_m_p").unwrap(), "two");
    assert!(reader.next_block(CT_BLOCK).unwrap().is_none());
}

#[test]
fn parser_strategy_is_visible() {
    let parser = MaeParser::direct("".as_bytes());
    assert_eq!(parser.strategy(), IndexedStrategy::Direct);
    let parser = MaeParser::new("".as_bytes());
    assert_eq!(parser.strategy(), IndexedStrategy::Buffered);
}
