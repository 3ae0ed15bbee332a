use rki::{apdu::Instruction, ErrorKind, TransferOptions};
use rki_apdu::Interface;

mod helpers;
use helpers::*;

const FILE: &str = "terminal.crt";

fn read_offsets(sim: &rki_sim::Sim) -> Vec<u32> {
    sim.commands()
        .iter()
        .filter(|c| c.is(Instruction::FileRead))
        .filter_map(|c| c.offset)
        .collect()
}

#[tokio::test]
async fn download_chunk_counts() -> anyhow::Result<()> {
    let c = 252;

    for n in [1, c - 1, c, c + 1, 4 * c] {
        let (sim, d) = setup();
        let data = test_data(n);
        sim.put_file(FILE, &data);

        let opts = TransferOptions::download().with_chunk(c);
        let r = d.download(Interface::Primary, FILE, &opts, |_| ()).await?;

        assert_eq!(r, data, "content mismatch for {n} bytes");

        // One read per chunk, each starting where the last ended
        let offsets = read_offsets(&sim);
        let expected: Vec<_> = (0..n).step_by(c).map(|o| o as u32).collect();
        assert_eq!(offsets, expected, "read offsets for {n} bytes");
        assert_eq!(offsets.len(), (n + c - 1) / c);
    }

    Ok(())
}

#[tokio::test]
async fn download_empty_file() {
    let (sim, d) = setup();
    sim.put_file(FILE, &[]);

    let e = d
        .download(Interface::Primary, FILE, &TransferOptions::download(), |_| ())
        .await
        .unwrap_err();

    assert!(matches!(e, rki::Error::EmptyFile(ref f) if f == FILE), "{e:?}");
    assert!(read_offsets(&sim).is_empty());
}

#[tokio::test]
async fn download_missing_file() {
    let (sim, d) = setup();

    let e = d
        .download(Interface::Primary, FILE, &TransferOptions::download(), |_| ())
        .await
        .unwrap_err();

    assert!(matches!(e, rki::Error::FileNotFound(_)), "{e:?}");
    assert_eq!(e.kind(), ErrorKind::DeviceProtocol);
    assert!(read_offsets(&sim).is_empty());
}

#[tokio::test]
async fn download_two_chunks_single_progress() -> anyhow::Result<()> {
    let (sim, d) = setup();
    let data = test_data(504);
    sim.put_file(FILE, &data);

    let opts = TransferOptions::download()
        .with_chunk(252)
        .with_granularity(504);

    let mut progress = vec![];
    let r = d
        .download(Interface::Primary, FILE, &opts, |p| progress.push(p))
        .await?;

    assert_eq!(r.len(), 504);
    assert_eq!(read_offsets(&sim), vec![0, 252]);
    assert_eq!(progress, vec![1.0]);

    Ok(())
}

#[tokio::test]
async fn download_progress_monotonic() -> anyhow::Result<()> {
    let (sim, d) = setup();
    sim.put_file(FILE, &test_data(10_000));

    let opts = TransferOptions::download().with_chunk(252).with_granularity(600);

    let mut progress = vec![];
    d.download(Interface::Primary, FILE, &opts, |p| progress.push(p))
        .await?;

    assert!(!progress.is_empty());
    assert!(progress.windows(2).all(|w| w[0] <= w[1]), "{progress:?}");
    assert!(progress.iter().all(|p| (0.0..=1.0).contains(p)));
    assert_eq!(progress.last(), Some(&1.0));

    Ok(())
}

#[tokio::test]
async fn download_small_file_no_progress() -> anyhow::Result<()> {
    let (sim, d) = setup();
    sim.put_file(FILE, &test_data(100));

    let mut progress = vec![];
    d.download(
        Interface::Primary,
        FILE,
        &TransferOptions::download(),
        |p| progress.push(p),
    )
    .await?;

    assert!(progress.is_empty());

    Ok(())
}

#[tokio::test]
async fn download_short_reads() -> anyhow::Result<()> {
    let (sim, d) = setup();
    let data = test_data(1000);
    sim.put_file(FILE, &data);
    sim.faults(|f| f.max_read = Some(100));

    let opts = TransferOptions::download().with_chunk(252);
    let r = d.download(Interface::Primary, FILE, &opts, |_| ()).await?;

    assert_eq!(r, data);

    // Offsets advance by the bytes actually returned
    let expected: Vec<u32> = (0..1000).step_by(100).collect();
    assert_eq!(read_offsets(&sim), expected);

    Ok(())
}

#[tokio::test]
async fn download_read_failure() {
    let (sim, d) = setup();
    sim.put_file(FILE, &test_data(1000));
    sim.faults(|f| f.fail_read_at = Some(504));

    let opts = TransferOptions::download().with_chunk(252);
    let e = d
        .download(Interface::Primary, FILE, &opts, |_| ())
        .await
        .unwrap_err();

    assert!(
        matches!(e, rki::Error::TransferFailed { offset: 504 }),
        "{e:?}"
    );

    // No reads following the failure
    assert_eq!(read_offsets(&sim), vec![0, 252, 504]);
}

#[tokio::test]
async fn download_timeout() {
    let (sim, d) = setup();
    sim.put_file(FILE, &test_data(1000));

    // Respond to the select and first read only
    sim.faults(|f| f.drop_responses_after = Some(2));

    let opts = TransferOptions::download().with_chunk(252);
    let e = d
        .download(Interface::Primary, FILE, &opts, |_| ())
        .await
        .unwrap_err();

    assert!(matches!(e, rki::Error::RequestTimeout), "{e:?}");
    assert_eq!(e.kind(), ErrorKind::Transport);
}

#[tokio::test]
async fn download_zero_chunk_rejected() {
    let (sim, d) = setup();
    sim.put_file(FILE, &test_data(10));

    let e = d
        .download(
            Interface::Primary,
            FILE,
            &TransferOptions::download().with_chunk(0),
            |_| (),
        )
        .await
        .unwrap_err();

    assert_eq!(e.kind(), ErrorKind::Input);
    assert!(sim.commands().is_empty());
}

#[tokio::test]
async fn download_per_interface() -> anyhow::Result<()> {
    let (sim, d) = setup();
    sim.put_file(FILE, &test_data(300));

    let r = d
        .download(
            Interface::Secondary,
            FILE,
            &TransferOptions::download(),
            |_| (),
        )
        .await?;
    assert_eq!(r.len(), 300);

    assert!(sim
        .commands()
        .iter()
        .all(|c| c.interface == Interface::Secondary));

    Ok(())
}
