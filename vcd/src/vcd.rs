use std::{borrow::Cow, path::Path, sync::OnceLock};

use anyhow::{Context, Result};
use log::info;

use crate::{
    error::ParseError,
    mapped::MappedFile,
    parser::{parse_declarations, parse_sim_cmds, ParseOptions, ParsedSimCmds},
    types::{Declarations, Document, SimCmd},
};

/// A VCD file on disk.
///
/// The header is parsed when the file is opened, since it is small and
/// everything else needs it. The body is parsed the first time it is asked
/// for and the result (or error) is kept, so later calls are free. This is
/// safe to share between threads; if several ask for the body at once it is
/// still only parsed once.
pub struct VcdFile {
    input: MappedFile,
    options: ParseOptions,
    body_offset: usize,
    declarations: Declarations,
    document: OnceLock<Result<Document, ParseError>>,
}

impl VcdFile {
    pub fn open(path: &Path) -> Result<Self> {
        Self::open_with_options(path, ParseOptions::default())
    }

    pub fn open_with_options(path: &Path, options: ParseOptions) -> Result<Self> {
        let input = MappedFile::open(path)?;
        let (declarations, body_offset) = parse_declarations(input.data())
            .with_context(|| format!("Parsing declarations of {}", path.display()))?;
        info!(
            "Opened {}: header is {} of {} bytes",
            path.display(),
            body_offset,
            input.size()
        );
        Ok(Self {
            input,
            options,
            body_offset,
            declarations,
            document: OnceLock::new(),
        })
    }

    pub fn path(&self) -> &Path {
        self.input.path()
    }

    pub fn data(&self) -> &[u8] {
        self.input.data()
    }

    pub fn size(&self) -> usize {
        self.input.size()
    }

    pub fn string_view(&self) -> Cow<'_, str> {
        self.input.string_view()
    }

    pub fn options(&self) -> &ParseOptions {
        &self.options
    }

    /// Where the body starts.
    pub fn body_offset(&self) -> usize {
        self.body_offset
    }

    pub fn declarations(&self) -> &Declarations {
        &self.declarations
    }

    pub fn is_body_parsed(&self) -> bool {
        self.document.get().is_some()
    }

    /// The whole document, parsing the body if it hasn't been already.
    pub fn document(&self) -> Result<&Document, ParseError> {
        self.document
            .get_or_init(|| {
                let ParsedSimCmds {
                    sim_cmds,
                    diagnostics,
                } = parse_sim_cmds(self.input.data(), self.body_offset, &self.options)?;
                Ok(Document {
                    declarations: self.declarations.clone(),
                    sim_cmds,
                    diagnostics,
                })
            })
            .as_ref()
            .map_err(Clone::clone)
    }

    pub fn sim_cmds(&self) -> Result<&[SimCmd], ParseError> {
        Ok(&self.document()?.sim_cmds)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        error::{ParseErrorKind, ParsePhase},
        types::{DumpSection, ScopeType},
    };
    use flate2::{write::GzEncoder, Compression};
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn logging_setup() {
        let _ = env_logger::builder()
            .is_test(true)
            .filter_level(log::LevelFilter::Info)
            .try_init();
    }

    fn write_temp(contents: &[u8]) -> NamedTempFile {
        let mut f = NamedTempFile::new().unwrap();
        f.write_all(contents).unwrap();
        f.flush().unwrap();
        f
    }

    const SMALL: &str = "$timescale 10 ns $end
$scope module top $end
$var wire 1 ! clk $end
$upscope $end
$enddefinitions $end
#0
0!
#1
1!
";

    #[test]
    fn test_open_small() {
        logging_setup();
        let f = write_temp(SMALL.as_bytes());
        let vcd = VcdFile::open(f.path()).unwrap();

        assert_eq!(vcd.path(), f.path());
        assert_eq!(vcd.size(), SMALL.len());
        assert_eq!(vcd.string_view(), SMALL);
        assert_eq!(&SMALL[vcd.body_offset()..], "\n#0\n0!\n#1\n1!\n");
        assert_eq!(
            vcd.declarations()
                .timescale
                .map(|t| t.timebase_power()),
            Some(-8)
        );
        assert!(!vcd.is_body_parsed());

        let doc = vcd.document().unwrap();
        assert!(vcd.is_body_parsed());
        assert_eq!(&doc.declarations, vcd.declarations());
        assert_eq!(doc.sim_cmds.len(), 4);
        assert_eq!(vcd.sim_cmds().unwrap().len(), 4);
        // Cached, not reparsed.
        assert!(std::ptr::eq(doc, vcd.document().unwrap()));
    }

    #[test]
    fn test_concurrent_first_access() {
        logging_setup();
        let mut text = String::from(SMALL);
        for t in 2..2000 {
            text.push_str(&format!("#{t}\n{}!\n", t % 2));
        }
        let f = write_temp(text.as_bytes());
        let vcd = VcdFile::open(f.path()).unwrap();

        let docs: Vec<usize> = std::thread::scope(|s| {
            let handles: Vec<_> = (0..8)
                .map(|_| s.spawn(|| vcd.document().unwrap() as *const Document as usize))
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });
        assert!(docs.windows(2).all(|w| w[0] == w[1]));
        assert_eq!(vcd.document().unwrap().ticks().count(), 2000);
    }

    #[test]
    fn test_header_error() {
        let f = write_temp(b"$scope module top $end\n$enddefinitions $end\n");
        let err = VcdFile::open(f.path()).err().unwrap();
        let parse_error = err.downcast_ref::<ParseError>().unwrap();
        assert_eq!(parse_error.phase, ParsePhase::Declarations);
        assert_eq!(parse_error.kind, ParseErrorKind::UnbalancedScope { open: 1 });
        assert!(format!("{err:#}").contains("Parsing declarations"));
    }

    #[test]
    fn test_body_error_is_cached() {
        let f = write_temp(b"$enddefinitions $end\n#0\n1!\nq\n");
        let vcd = VcdFile::open(f.path()).unwrap();
        let first = vcd.document().unwrap_err();
        assert_eq!(first.phase, ParsePhase::SimCmds);
        assert_eq!(first.line, 4);
        assert_eq!(vcd.sim_cmds().unwrap_err(), first);
        assert!(vcd.is_body_parsed());
    }

    #[test]
    fn test_recovering_options() {
        let f = write_temp(b"$enddefinitions $end\n#0\n1!\nq\n#1\n");
        let vcd = VcdFile::open_with_options(
            f.path(),
            ParseOptions {
                recover_malformed_records: true,
            },
        )
        .unwrap();
        assert!(vcd.options().recover_malformed_records);
        let doc = vcd.document().unwrap();
        assert_eq!(doc.ticks().collect::<Vec<_>>(), vec![0, 1]);
        assert_eq!(doc.diagnostics.len(), 1);
    }

    #[test]
    fn test_gzipped() {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(SMALL.as_bytes()).unwrap();
        let f = write_temp(&encoder.finish().unwrap());

        let vcd = VcdFile::open(f.path()).unwrap();
        assert_eq!(vcd.data(), SMALL.as_bytes());
        assert_eq!(vcd.declarations().root().children.len(), 1);
        assert_eq!(vcd.document().unwrap().changes().count(), 2);
    }

    #[test]
    fn test_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        assert!(VcdFile::open(&dir.path().join("nope.vcd")).is_err());
    }

    #[test]
    fn test_sample() {
        logging_setup();
        let path = concat!(env!("CARGO_MANIFEST_DIR"), "/../samples/counter.vcd");
        let vcd = VcdFile::open(Path::new(path)).unwrap();
        let decls = vcd.declarations();

        assert_eq!(decls.version.as_deref(), Some("Icarus Verilog"));
        assert_eq!(decls.timescale.map(|t| t.to_string()).as_deref(), Some("1 ns"));
        assert_eq!(decls.num_vars(), 5);

        let (tb, tb_scope) = decls.children(crate::types::ROOT_SCOPE).next().unwrap();
        assert_eq!(tb_scope.scope_type, ScopeType::Module);
        assert_eq!(tb_scope.identifier, "counter_tb");
        let (dut, dut_scope) = decls.children(tb).next().unwrap();
        assert_eq!(decls.scope_path(dut), "counter_tb.dut");
        assert_eq!(dut_scope.vars.len(), 3);

        let doc = vcd.document().unwrap();
        assert!(doc.diagnostics.is_empty());
        assert_eq!(doc.sim_cmds[1], SimCmd::Dump(DumpSection::Vars));
        assert_eq!(doc.ticks().last(), Some(80));

        // Every change refers to a declared var.
        for change in doc.changes() {
            assert!(decls.var_by_id(&change.id).next().is_some(), "{}", change.id);
        }

        // The count is `count` in the last `b` change.
        let last_count = doc
            .changes()
            .filter(|c| c.id == "#")
            .last()
            .map(|c| c.value.to_string());
        assert_eq!(last_count.as_deref(), Some("b111"));
    }
}
