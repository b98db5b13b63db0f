//! HTML report rendering.
//!
//! Produces a self-contained HTML page: a scrollable D3 swimlane chart of
//! the job's filesystem operations (one row per resource, bars colored by
//! operation, widths proportional to elapsed time) followed by a legend and
//! a table of every event including the storage-layer requests. The chart's
//! grouping and coloring are presentation policy only; the analysis contract
//! is just the ordered event list and the job SQL.

use anyhow::Result;
use minijinja::{Environment, context};

use crate::timeline::JobTimeline;

/// D3 timeline template. `events` is injected as a JSON array whose objects
/// carry `layer`/`thread`/`resource`/`op`/`start_ms`/`elapsed_ms`;
/// `time_scale` is milliseconds of elapsed time per pixel.
const REPORT_TEMPLATE: &str = r#"<!DOCTYPE html>
<html>
  <body>
    <h2 style='font-family: sans-serif;'>{{ sql }}</h2>
    <div id="container"></div>
    <script src="https://cdn.jsdelivr.net/npm/d3@7"></script>
    <script type="module">

const width  = window.innerWidth || document.documentElement.clientWidth || document.body.clientWidth;
const height = window.innerHeight || document.documentElement.clientHeight || document.body.clientHeight;

const all_data = {{ events | tojson }}

const data = all_data.filter(e => e.layer === 'FS')

const threads = d3.groupSort(data, ([d]) => -d.start_ms, (d) => d.thread)
const files = d3.groupSort(data, ([d]) => -d.start_ms, (d) => d.resource)
const ops = [ 'open', 'read',  'asyncRead.complete', 'getFileAttributes', 'flush', 'create', 'write', 'close', 'exists', 'isDirectory', 'isFile', 'listFiles', 'listFiles.hasNext' ]
const query_end_ms = d3.max(data, (d) => d.start_ms + d.elapsed_ms)

// Declare the chart dimensions and margins.
const time_scale = {{ time_scale }}
const yAxisWidth = 400;

const marginTop = 30;
const marginRight = 5;
const marginBottom = 30;
const marginLeft = 5;
const chartWidth = Math.max(query_end_ms / time_scale, 400) + marginLeft + marginRight
const chartHeight = files.length * 30 + marginTop + marginBottom;
const visibleChartWidth = Math.min(chartWidth, width - yAxisWidth)

// Legend definitions
const legendIconSize = 10;
const legendColWidth = 150;
const legendRowHeight = legendIconSize * 2;
const legendMargin = 10;
const legendItemsPerCol = 4;
const legendNumCols = Math.ceil(ops.length / legendItemsPerCol);
const legendWidth = yAxisWidth + visibleChartWidth;
const legendHeight = (legendMargin * 2) + (legendRowHeight * (legendItemsPerCol + 1));
const legendLeftOffset = yAxisWidth + ((visibleChartWidth - (legendNumCols * legendColWidth)) / 2);

// Declare the x (horizontal position) scale.
const x = d3.scaleLinear()
  .domain([0, query_end_ms])
  .range([marginLeft, chartWidth - marginRight]);

// Declare the y scale.
const y = d3.scaleBand()
  .domain(files)
  .range([chartHeight - marginBottom, marginTop])
  .padding(0.25)

const color = d3.scaleOrdinal()
  .domain(ops)
  .range(d3.schemePaired)

const parent = d3.create("div");

// Create a div that holds two svg elements: one for the main chart and horizontal axis,
// which moves as the user scrolls the content; the other for the vertical axis (which
// doesn't scroll).
const chartDiv = parent.append("div")
  .attr("style", "display: flex;");

// Div to hold y axis
const yAxisDiv = chartDiv.append("div")
  .attr("style", `flex: 0 0 ${yAxisWidth}px;`);

// Create the fixed SVG container.
const fixedSvg = yAxisDiv.append("svg")
  .attr("width", yAxisWidth)
  .attr("height", chartHeight)
  .attr("viewBox", [0, 0, yAxisWidth, chartHeight])
  .attr("style", "max-width: 100%; height: auto;");

// Add the y-axis and label, and remove the domain line.
fixedSvg.append("g")
  .attr("transform", `translate(${yAxisWidth},0)`)
  .call(d3.axisLeft(y).tickSizeOuter(0).tickSizeInner(0))

// Create a scrolling div containing the area shape and the horizontal axis.
const body = chartDiv.append("div")
  .attr("style", "flex-grow: 1; overflow-x: auto;");

const svg = body.append("svg")
  .attr("width", chartWidth)
  .attr("height", chartHeight)
  .style("display", "block");

// Add a rect for each bar.
const bars = svg.append("g")
  .selectAll()
  .data(data);

bars.join("rect")
    .attr("x", (d) => x(d.start_ms))
    .attr("y", (d) => y(d.resource))
    .attr("height", y.bandwidth())
    .attr("width", (d) => x(d.start_ms + d.elapsed_ms) - x(d.start_ms))
    .attr("fill", (d) => color(d.op));

bars.join("text")
    .attr("x", (d) => x(d.start_ms + d.elapsed_ms) - 4)
    .attr("y", (d) => y(d.resource) + y.bandwidth() - 7)
    .attr("font-family", "sans-serif")
    .attr("font-size", "8pt")
    .style("text-anchor", "end")
    .style("fill", "white")
    .text((d) => d.elapsed_ms > 16 * time_scale ? d.elapsed_ms : null);

// Add the x-axis and label.
svg.append("g")
  .attr("transform", `translate(0,${chartHeight - marginBottom})`)
  .call(d3.axisBottom(x).tickSizeOuter(0));

// create a div + svg to hold the legend at the bottom
const legendSvg = parent.append("div").append("svg")
  .attr("width", legendWidth)
  .attr("height", legendHeight)
  .attr("viewBox", [0, 0, legendWidth, legendHeight])
  .attr("style", "max-width: 100%; height: auto;");

// Add an x axis label
legendSvg.append("text")
    .attr("x", yAxisWidth + (Math.min(chartWidth, width - yAxisWidth) / 2))
    .attr("y", legendMargin)
    .attr("text-anchor", "middle")
    .attr("font-family", "sans-serif")
    .attr("font-size", "8pt")
    .style("alignment-baseline", "middle")
    .text("Elapsed (ms)")


// Add one dot in the legend for each name.
legendSvg.selectAll("legend-marks")
  .data(ops)
  .enter()
  .append("rect")
    .attr("x", (d, i) => legendLeftOffset + (Math.floor(i / 4) * legendColWidth))
    .attr("y", (d, i) => legendMargin + (((i % 4) + 1) * legendRowHeight))
    .attr("height", legendIconSize)
    .attr("width", legendIconSize)
    .style("fill", (d) => color(d))

// Add the legend text labels
legendSvg.selectAll("legend-text")
  .data(ops)
  .enter()
  .append("text")
    .attr("x", (d, i) => legendLeftOffset + (legendIconSize * 2) + (Math.floor(i / 4) * legendColWidth))
    .attr("y", (d, i) => legendMargin + (legendIconSize / 2) + (((i % 4) + 1) * legendRowHeight))
    .text((d) => d)
    .attr("text-anchor", "left")
    .attr("font-family", "sans-serif")
    .attr("font-size", "8pt")
    .style("alignment-baseline", "middle")

container.append(parent.node())

// add table of the data
const columns = [ 'layer', 'thread', 'resource', 'op', 'start_ms', 'elapsed_ms' ]
const widths = [ 'auto', 'auto', 'auto', 'auto', 'auto', 'auto' ]

const table = d3.create('table')
  .style('font-family', 'sans-serif')
  .style('font-size', '10pt')
  .style('border', '1px solid darkgray')
  .style('border-collapse', 'collapse')
  .style('margin-top', '40px')
  .style('margin-left', '10px');

table.append('colgroup')
  .selectAll('col')
  .data(columns)
  .enter()
  .append('col')
  .style('width', (c, i) => widths[i]);

const thead = table.append('thead');
const tbody = table.append('tbody');

// append the header row
thead.append('tr')
  .selectAll('th')
  .data(columns).enter()
  .append('th')
  .style('border', '1px solid darkgray')
  .style('border-collapse', 'collapse')
  .style('padding', '4px 10px 4px 10px')
  .text((c) => c);

// create a row for each object in the data
const rows = tbody.selectAll('tr')
  .data(all_data)
  .enter()
  .append('tr');

// create a cell in each row for each column
const cells = rows.selectAll('td')
  .data((r) => columns.map((c) => { return { column: c, value: r[c] }}))
  .enter()
  .append('td')
  .style('border', '1px solid darkgray')
  .style('border-collapse', 'collapse')
  .style('padding', '4px 10px 4px 10px')
  .style('text-align', (d) => d.column === 'start_ms' || d.column == 'elapsed_ms' ? 'right' : 'left')
  .text((d) => d.value);

container.append(table.node())

    </script>
  </body>
</html>
"#;

/// Render the timeline to a self-contained HTML page.
///
/// `time_scale` is a rendering-only knob: milliseconds of elapsed time per
/// pixel of chart width.
pub fn render_report(timeline: &JobTimeline, time_scale: f64) -> Result<String> {
    let env = Environment::new();
    let tmpl = env.template_from_str(REPORT_TEMPLATE)?;
    let html = tmpl.render(context! {
        sql => timeline.sql,
        events => timeline.events,
        time_scale,
    })?;
    Ok(html)
}
